use embedded_hal::serial::{Read, Write};
use log::debug;
use nb::block;

use crate::bills::BillTable;
use crate::commands::Command;
use crate::error::Error;
use crate::link::{Frame, FrameCodec};
use crate::responses::{CountResult, Reply, ReplyKind};
use crate::session::{RetryPolicy, Session, SessionState, TransmitTwice};
use crate::utils::FromPayload;

/// The request currently on the wire. Taken exactly once when it settles.
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    kind: ReplyKind,
}

/// Represents an F56 dispenser connected to a U(S)ART.
#[derive(Debug)]
pub struct F56<TX, RX, P = TransmitTwice> {
    session: Session<TX, P>,
    rx: RX,
    codec: FrameCodec,
    pending: Option<PendingRequest>,
}

impl<TX, RX> F56<TX, RX, TransmitTwice>
where
    TX: Write<u8>,
    RX: Read<u8>,
    RX::Error: Into<TX::Error>,
{
    pub fn new(tx: TX, rx: RX) -> Self {
        Self::with_policy(tx, rx, TransmitTwice)
    }
}

/// Errors from either serial half come back as [`Error::Transport`] carrying
/// the TX error type; RX errors are converted with `Into`. Halves sharing one
/// error type (the usual case) need nothing extra.
impl<TX, RX, P> F56<TX, RX, P>
where
    TX: Write<u8>,
    RX: Read<u8>,
    RX::Error: Into<TX::Error>,
    P: RetryPolicy,
{
    pub fn with_policy(tx: TX, rx: RX, policy: P) -> Self {
        Self {
            session: Session::new(tx, policy),
            rx,
            codec: FrameCodec::new(),
            pending: None,
        }
    }

    /// Gives back the serial halves.
    pub fn release(self) -> (TX, RX) {
        (self.session.release(), self.rx)
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_idle(&self) -> bool {
        self.session.is_idle()
    }

    /// Sends a command without waiting for the reply. Use [`F56::poll`] to
    /// collect it.
    ///
    /// Fails with [`Error::Busy`] if another request is still outstanding.
    /// Anything the device sent since the last request settled (such as its
    /// answer to the duplicate transmission) is read and dropped first.
    pub fn submit(&mut self, command: &Command) -> Result<(), Error<TX::Error>> {
        if !self.session.is_idle() {
            return Err(Error::Busy);
        }
        self.drain()?;

        if let Err(e) = self.session.issue(command) {
            if let Error::Transport(_) = e {
                self.codec.reset();
            }
            return Err(e);
        }
        self.pending = Some(PendingRequest {
            kind: command.reply_kind(),
        });
        Ok(())
    }

    /// Reads whatever the device has sent so far and tries to settle the
    /// outstanding request.
    ///
    /// Returns `WouldBlock` until the reply (or an error) has arrived.
    pub fn poll(&mut self) -> nb::Result<Reply, Error<TX::Error>> {
        let (kind, frame) = self.poll_frame()?;
        Reply::decode(kind, &frame).map_err(|e| nb::Error::Other(e.into()))
    }

    /// Sends a command and blocks until the reply arrives.
    pub fn request(&mut self, command: &Command) -> Result<Reply, Error<TX::Error>> {
        self.submit(command)?;
        block!(self.poll())
    }

    /// Loads bill information for the top and bottom cassettes.
    pub fn initialize<B>(
        &mut self,
        bills: &B,
        currency: &str,
        top: usize,
        bottom: usize,
    ) -> Result<(), Error<TX::Error>>
    where
        B: BillTable + ?Sized,
    {
        let command = Command::initialize(bills, currency, top, bottom)?;
        self.submit(&command)?;
        block!(self.poll_frame())?;
        debug!("F56 initialized for {}", currency);
        Ok(())
    }

    /// Counts notes out of the top and bottom cassettes.
    pub fn count(&mut self, top: u8, bottom: u8) -> Result<CountResult, Error<TX::Error>> {
        let command = Command::count(top, bottom)?;
        self.submit(&command)?;
        let (_, frame) = block!(self.poll_frame())?;
        let result = CountResult::from_payload(frame.as_bytes())?;
        debug!("F56 count result: {:?}", result);
        Ok(result)
    }

    /// Drives the link until the session settles. The pending request is
    /// taken on every way out except `WouldBlock`.
    fn poll_frame(&mut self) -> nb::Result<(ReplyKind, Frame), Error<TX::Error>> {
        let kind = match self.pending {
            Some(pending) => pending.kind,
            None => return Err(nb::Error::Other(Error::NoPendingRequest)),
        };

        loop {
            let byte = match self.rx.read() {
                Ok(byte) => byte,
                Err(nb::Error::WouldBlock) => return Err(nb::Error::WouldBlock),
                Err(nb::Error::Other(e)) => {
                    self.session.abort();
                    self.codec.reset();
                    self.pending = None;
                    return Err(nb::Error::Other(Error::Transport(e.into())));
                }
            };

            let event = match self.codec.feed(byte) {
                Some(event) => event,
                None => continue,
            };

            if let Some(outcome) = self.session.handle(event) {
                self.pending = None;
                return outcome
                    .map(|frame| (kind, frame))
                    .map_err(nb::Error::Other);
            }
        }
    }

    /// Feeds every byte RX has ready through the idle session, which drops
    /// whatever it assembles.
    fn drain(&mut self) -> Result<(), Error<TX::Error>> {
        loop {
            match self.rx.read() {
                Ok(byte) => {
                    if let Some(event) = self.codec.feed(byte) {
                        self.session.handle(event);
                    }
                }
                Err(nb::Error::WouldBlock) => return Ok(()),
                Err(nb::Error::Other(e)) => {
                    self.codec.reset();
                    return Err(Error::Transport(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::Currency;
    use crate::constants::FS;
    use crate::link::LinkStatus;
    use crate::responses::tests::count_reply;
    use crate::responses::Header;
    use crate::session::TransmitOnce;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn init_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::max())
            .is_test(true)
            .try_init();
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LinkDown;

    type Wire = Rc<RefCell<VecDeque<u8>>>;

    /// Plays the device: each separator it sees completes a transmission and
    /// releases the next scripted reply onto the RX wire.
    #[derive(Debug, Default)]
    struct FakeTx {
        sent: Wire,
        script: Rc<RefCell<VecDeque<Vec<u8>>>>,
        inbox: Wire,
    }

    #[derive(Debug, Default)]
    struct FakeRx {
        wire: Wire,
        fail: Rc<RefCell<bool>>,
    }

    impl Write<u8> for FakeTx {
        type Error = LinkDown;

        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            self.sent.borrow_mut().push_back(word);
            if word == FS {
                if let Some(reply) = self.script.borrow_mut().pop_front() {
                    self.inbox.borrow_mut().extend(reply);
                }
            }
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Ok(())
        }
    }

    impl Read<u8> for FakeRx {
        type Error = LinkDown;

        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            if *self.fail.borrow() {
                return Err(nb::Error::Other(LinkDown));
            }
            self.wire
                .borrow_mut()
                .pop_front()
                .ok_or(nb::Error::WouldBlock)
        }
    }

    struct Harness {
        sent: Wire,
        inbox: Wire,
        script: Rc<RefCell<VecDeque<Vec<u8>>>>,
        fail: Rc<RefCell<bool>>,
        f56: F56<FakeTx, FakeRx>,
    }

    impl Harness {
        fn new() -> Self {
            init_logger();
            let rx = FakeRx::default();
            let tx = FakeTx {
                inbox: rx.wire.clone(),
                ..FakeTx::default()
            };
            Harness {
                sent: tx.sent.clone(),
                inbox: rx.wire.clone(),
                script: tx.script.clone(),
                fail: rx.fail.clone(),
                f56: F56::new(tx, rx),
            }
        }

        /// Bytes that are on the wire right now.
        fn push(&self, bytes: &[u8]) {
            self.inbox.borrow_mut().extend(bytes.iter().copied());
        }

        /// A frame the device sends once the next transmission completes.
        fn reply(&self, bytes: &[u8]) {
            let mut frame = bytes.to_vec();
            frame.push(FS);
            self.script.borrow_mut().push_back(frame);
        }

        fn sent(&self) -> Vec<u8> {
            self.sent.borrow().iter().copied().collect()
        }
    }

    const BILLS: &[Currency<'static>] = &[Currency {
        code: "USD",
        lengths: &[0x00, 0x9b, 0x9b, 0x9b],
        thickness: 0x0c,
    }];

    #[test]
    fn initialize_sends_twice_and_succeeds() {
        let mut h = Harness::new();
        h.reply(&[0x60, 0x02, 0x34, 0x00]);

        h.f56.initialize(BILLS, "USD", 1, 1).unwrap();

        let once = [
            0x60, 0x02, 0x0d, 0x00, 0x9b, 0x9b, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x0c, 0x0c, 0x0c,
            0x1c,
        ];
        let mut twice = once.to_vec();
        twice.extend_from_slice(&once);
        assert_eq!(h.sent(), twice);
        assert!(h.f56.is_idle());
    }

    #[test]
    fn count_decodes_result() {
        let mut h = Harness::new();
        h.reply(&count_reply([7, 11], [0, 2]));

        let result = h.f56.count(8, 12).unwrap();
        assert_eq!(
            result,
            CountResult {
                accepted: [7, 11],
                rejected: [0, 2],
            }
        );

        let sent = h.sent();
        // D(8) and D(12) right after the option byte.
        assert_eq!(&sent[4..8], &[0x30, 0xb8, 0xb1, 0xb2]);
    }

    #[test]
    fn submit_while_awaiting_is_busy() {
        let mut h = Harness::new();
        h.f56.submit(&Command::count(1, 1).unwrap()).unwrap();
        let sent = h.sent().len();
        h.push(&count_reply([1, 1], [0, 0]));
        h.push(&[FS]);

        let err = h.f56.submit(&Command::count(2, 2).unwrap()).unwrap_err();
        assert_eq!(err, Error::Busy);
        assert_eq!(h.sent().len(), sent);
        assert_eq!(h.f56.state(), SessionState::AwaitingResponse);

        // The rejected submit left the reply for the request in flight.
        assert!(matches!(h.f56.poll(), Ok(Reply::Count(r)) if r.accepted == [1, 1]));
    }

    #[test]
    fn poll_would_block_until_reply() {
        let mut h = Harness::new();
        h.f56.submit(&Command::count(1, 0).unwrap()).unwrap();
        assert!(matches!(h.f56.poll(), Err(nb::Error::WouldBlock)));

        let reply = count_reply([1, 0], [0, 0]);
        h.push(&reply[..10]);
        assert!(matches!(h.f56.poll(), Err(nb::Error::WouldBlock)));
        assert_eq!(h.f56.state(), SessionState::AwaitingResponse);

        h.push(&reply[10..]);
        h.push(&[FS]);
        assert!(matches!(h.f56.poll(), Ok(Reply::Count(r)) if r.accepted == [1, 0]));
        assert!(h.f56.is_idle());
    }

    #[test]
    fn poll_without_request() {
        let mut h = Harness::new();
        assert!(matches!(
            h.f56.poll(),
            Err(nb::Error::Other(Error::NoPendingRequest))
        ));
    }

    #[test]
    fn device_error_carries_frame() {
        let mut h = Harness::new();
        h.reply(&[0xf0, 0x03, 0x99, 0x30, 0xb1]);

        let err = h.f56.count(1, 1).unwrap_err();
        assert_eq!(
            err,
            Error::Device {
                frame: Frame::from_bytes(&[0xf0, 0x03, 0x99, 0x30, 0xb1]).unwrap()
            }
        );
        assert!(h.f56.is_idle());
    }

    #[test]
    fn misrouted_reply_is_header_mismatch() {
        let mut h = Harness::new();
        // A perfectly decodable count reply, but we asked for initialize.
        h.reply(&count_reply([9, 9], [0, 0]));

        let err = h.f56.initialize(BILLS, "USD", 1, 2).unwrap_err();
        assert_eq!(
            err,
            Error::HeaderMismatch {
                expected: Header::INITIALIZE,
                found: Header::COUNT,
            }
        );
    }

    #[test]
    fn parity_error_fails_request_then_link_recovers() {
        let mut h = Harness::new();
        let mut corrupt = count_reply([1, 1], [0, 0]);
        corrupt[0x28] ^= 0x80;
        h.reply(&corrupt);

        let err = h.f56.count(1, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Link(LinkStatus::ParityError { offset: 0x28, .. })
        ));

        // The rest of the corrupt frame is still queued; the next reply must
        // come out clean behind it.
        h.reply(&count_reply([4, 5], [1, 0]));
        let result = h.f56.count(4, 5).unwrap();
        assert_eq!(result.accepted, [4, 5]);
        assert_eq!(result.rejected, [1, 0]);
    }

    #[test]
    fn duplicate_reply_is_dropped_before_next_request() {
        let mut h = Harness::new();
        // The device answers both copies of the initialize command.
        h.reply(&[0x60, 0x02, 0x34]);
        h.reply(&[0x60, 0x02, 0x34]);
        h.f56.initialize(BILLS, "USD", 1, 1).unwrap();
        assert_eq!(h.inbox.borrow().len(), 4);

        h.reply(&count_reply([8, 12], [0, 0]));
        let result = h.f56.count(8, 12).unwrap();
        assert_eq!(result.accepted, [8, 12]);
        assert!(h.inbox.borrow().is_empty());
    }

    #[test]
    fn read_error_discards_partial_frame() {
        let mut h = Harness::new();
        h.f56.submit(&Command::count(4, 5).unwrap()).unwrap();
        let reply = count_reply([4, 5], [1, 0]);
        h.push(&reply[..10]);
        assert!(matches!(h.f56.poll(), Err(nb::Error::WouldBlock)));

        *h.fail.borrow_mut() = true;
        assert!(matches!(
            h.f56.poll(),
            Err(nb::Error::Other(Error::Transport(LinkDown)))
        ));
        *h.fail.borrow_mut() = false;

        h.reply(&reply);
        let result = h.f56.count(4, 5).unwrap();
        assert_eq!(result.accepted, [4, 5]);
        assert_eq!(result.rejected, [1, 0]);
    }

    #[test]
    fn read_error_while_draining_fails_submit() {
        let mut h = Harness::new();
        *h.fail.borrow_mut() = true;

        let err = h.f56.submit(&Command::count(1, 1).unwrap()).unwrap_err();
        assert_eq!(err, Error::Transport(LinkDown));
        assert!(h.sent().is_empty());
        assert!(h.f56.is_idle());
    }

    #[test]
    fn transport_error_aborts_request() {
        let mut h = Harness::new();
        h.f56.submit(&Command::count(1, 1).unwrap()).unwrap();
        *h.fail.borrow_mut() = true;

        assert!(matches!(
            h.f56.poll(),
            Err(nb::Error::Other(Error::Transport(LinkDown)))
        ));
        assert!(h.f56.is_idle());
        assert!(matches!(
            h.f56.poll(),
            Err(nb::Error::Other(Error::NoPendingRequest))
        ));
    }

    #[test]
    fn invalid_arguments_send_nothing() {
        let mut h = Harness::new();
        assert!(matches!(
            h.f56.initialize(BILLS, "XYZ", 1, 1),
            Err(Error::Command(_))
        ));
        assert!(matches!(h.f56.count(100, 0), Err(Error::Command(_))));
        assert!(h.sent().is_empty());
        assert!(h.f56.is_idle());
    }

    #[test]
    fn single_transmission_policy() {
        init_logger();
        let tx = FakeTx::default();
        let rx = FakeRx::default();
        let sent = tx.sent.clone();
        let mut f56 = F56::with_policy(tx, rx, TransmitOnce);

        f56.submit(&Command::count(1, 1).unwrap()).unwrap();
        assert_eq!(sent.borrow().len(), 25);
        let (_tx, _rx) = f56.release();
    }

    #[derive(Debug)]
    struct Framing;

    impl From<Framing> for LinkDown {
        fn from(_: Framing) -> Self {
            LinkDown
        }
    }

    #[derive(Debug)]
    struct NoisyRx;

    impl Read<u8> for NoisyRx {
        type Error = Framing;

        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            Err(nb::Error::Other(Framing))
        }
    }

    #[test]
    fn rx_error_converts_into_tx_error() {
        init_logger();
        let mut f56 = F56::new(FakeTx::default(), NoisyRx);

        let err = f56.submit(&Command::count(1, 1).unwrap()).unwrap_err();
        assert_eq!(err, Error::Transport(LinkDown));
    }
}
