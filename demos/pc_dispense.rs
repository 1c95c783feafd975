use std::io::{self, Read as _, Write as _};
use std::{cell::RefCell, env, time::Duration};

use embedded_hal::serial::{Read, Write};
use f56::{constants::BAUD_RATE, Currency, F56};
use serialport::prelude::*;

// Placeholder geometry; use the values from your cassette documentation.
const BILLS: &[Currency<'static>] = &[
    Currency {
        code: "USD",
        lengths: &[0x00, 0x9b, 0x9b, 0x9b, 0x9b],
        thickness: 0x0c,
    },
    Currency {
        code: "EUR",
        lengths: &[0x00, 0x78, 0x7f, 0x85, 0x8c],
        thickness: 0x0b,
    },
];

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => run(args[1].as_str(), 8, 12),
        4 => run(
            args[1].as_str(),
            args[2].parse().expect("count must be 0-99"),
            args[3].parse().expect("count must be 0-99"),
        ),
        _ => panic!("Usage: pc_dispense [port_name [top_count bottom_count]]"),
    };
}

fn print_ports() {
    let ports = serialport::available_ports().unwrap();
    for port in ports {
        println!("Available port: {} ({:#?})", port.port_name, port.port_type);
    }
}

fn run(port_name: &str, top: u8, bottom: u8) {
    println!("Using port {}", port_name);
    let settings = SerialPortSettings {
        baud_rate: BAUD_RATE,
        data_bits: DataBits::Eight,
        flow_control: FlowControl::None,
        parity: Parity::Even,
        stop_bits: StopBits::One,
        timeout: Duration::from_millis(100),
    };
    let port = serialport::open_with_settings(port_name, &settings).unwrap();
    println!("F56 connected");

    let port_cell = RefCell::new(port);
    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let mut f56 = F56::new(writer, reader);

    let result = f56
        .initialize(BILLS, "USD", 1, 1)
        .and_then(|_| f56.count(top, bottom));

    match result {
        Ok(result) => println!("{:#?}", result),
        Err(e) => println!("Error: {}", e),
    }

    // Make sure nothing is left half-written before the port closes.
    let (mut writer, _reader) = f56.release();
    nb::block!(writer.flush()).ok();
}

// We're cheating here and will use the host OS's serial port
// as our UART, and for that we have to implement the read/write
// interfaces from embedded-hal.

struct SerialReader<'a>(&'a RefCell<Box<dyn SerialPort>>);
struct SerialWriter<'a>(&'a RefCell<Box<dyn SerialPort>>);

impl Read<u8> for SerialReader<'_> {
    type Error = io::Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let mut buf: [u8; 1] = [0u8];
        match self.0.borrow_mut().read(&mut buf) {
            Ok(1) => Ok(buf[0]),
            Ok(_) => Err(nb::Error::WouldBlock),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }
}

impl Write<u8> for SerialWriter<'_> {
    type Error = io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let buf: [u8; 1] = [word];
        match self.0.borrow_mut().write(&buf) {
            Ok(1) => Ok(()),
            Ok(_) => Err(nb::Error::WouldBlock),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.0.borrow_mut().flush().map_err(nb::Error::Other)
    }
}
