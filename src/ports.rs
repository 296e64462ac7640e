//! 串口枚举
//!
//! Lists serial ports a pair can be chosen from and opens them for the unit
//! tests.

use anyhow::{Context, Result};
use log::debug;
use mio_serial::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;

/// Every port the OS reports. Enumeration failures yield an empty list.
pub fn available_ports() -> Vec<SerialPortInfo> {
    match mio_serial::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Serial port enumeration failed: {e}");
            Vec::new()
        }
    }
}

/// Enumeration record for `name`, if the port exists.
pub fn find_port(name: &str) -> Option<SerialPortInfo> {
    available_ports().into_iter().find(|p| p.port_name == name)
}

/// A port is busy when it exists but cannot be opened.
pub fn is_busy(name: &str) -> bool {
    open_port(name, 9600, Duration::from_millis(100)).is_err()
}

/// Names of ports that exist and are not busy.
pub fn pair_candidates() -> Vec<String> {
    available_ports()
        .into_iter()
        .map(|p| p.port_name)
        .filter(|name| !is_busy(name))
        .collect()
}

/// 打开串口
pub fn open_port(name: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    mio_serial::new(name, baud_rate)
        .timeout(timeout)
        .open()
        .with_context(|| format!("Unable to open serial port: {name}"))
}

/// One-line human readable description of a port's enumeration record.
pub fn describe(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} usb {:04x}:{:04x} manufacturer={} product={} serial={}",
            info.port_name,
            usb.vid,
            usb.pid,
            usb.manufacturer.as_deref().unwrap_or("-"),
            usb.product.as_deref().unwrap_or("-"),
            usb.serial_number.as_deref().unwrap_or("-"),
        ),
        SerialPortType::PciPort => format!("{} pci", info.port_name),
        SerialPortType::BluetoothPort => format!("{} bluetooth", info.port_name),
        SerialPortType::Unknown => format!("{} unknown", info.port_name),
    }
}
