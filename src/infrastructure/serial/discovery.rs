use crate::domain::error::BridgeResult;
use serde::Serialize;

/// A serial port visible to the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
    pub description: String,
}

impl From<serialport::SerialPortInfo> for PortSummary {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let (kind, description) = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                let mut description = format!("{:04x}:{:04x}", usb.vid, usb.pid);
                if let Some(manufacturer) = usb.manufacturer {
                    description.push(' ');
                    description.push_str(&manufacturer);
                }
                if let Some(product) = usb.product {
                    description.push(' ');
                    description.push_str(&product);
                }
                ("usb", description)
            }
            serialport::SerialPortType::PciPort => ("pci", String::new()),
            serialport::SerialPortType::BluetoothPort => ("bluetooth", String::new()),
            serialport::SerialPortType::Unknown => ("unknown", String::new()),
        };

        Self {
            name: info.port_name,
            kind: kind.to_string(),
            description,
        }
    }
}

/// List serial ports, sorted by name
pub fn list_ports() -> BridgeResult<Vec<PortSummary>> {
    let mut ports: Vec<PortSummary> = serialport::available_ports()?
        .into_iter()
        .map(PortSummary::from)
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ports)
}
