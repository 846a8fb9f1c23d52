//! Human-readable dump of every HID interface, for support requests.

use std::fmt;

use crate::dualsense::constants::{CANDIDATE_PIDS, SONY_VID};
use crate::dualsense::{HidBackend, HidHandle, HidInterface};
use crate::error::Result;

pub struct DiagnosticEntry {
    pub interface: HidInterface,
    /// `Ok(writable)` when the interface opened, the error text otherwise.
    pub open_result: std::result::Result<bool, String>,
}

impl DiagnosticEntry {
    pub fn could_be_dualsense(&self) -> bool {
        could_be_dualsense(&self.interface)
    }
}

pub struct DiagnosticReport {
    pub entries: Vec<DiagnosticEntry>,
}

/// Sony vendor id plus either a known product id or a matching name.
pub fn could_be_dualsense(iface: &HidInterface) -> bool {
    let name_match = iface.product_name.as_deref().is_some_and(|name| {
        let name = name.to_lowercase();
        name.contains("dualsense") || name.contains("wireless controller")
    });
    iface.vendor_id == SONY_VID && (CANDIDATE_PIDS.contains(&iface.product_id) || name_match)
}

/// Enumerates and tries to open every interface.
pub async fn report<B: HidBackend>(backend: &B) -> Result<DiagnosticReport> {
    let interfaces = backend.enumerate().await?;
    let mut entries = Vec::with_capacity(interfaces.len());
    for interface in interfaces {
        let open_result = backend
            .open(&interface.path)
            .await
            .map(|handle| handle.can_write())
            .map_err(|e| e.to_string());
        entries.push(DiagnosticEntry {
            interface,
            open_result,
        });
    }
    Ok(DiagnosticReport { entries })
}

fn or_null(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("[NULL]")
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "============== HID DEVICE DIAGNOSTIC REPORT ==============")?;
        writeln!(f, "Total HID devices found: {}", self.entries.len())?;
        for (i, entry) in self.entries.iter().enumerate() {
            let iface = &entry.interface;
            writeln!(f)?;
            writeln!(f, "--- DEVICE #{} ---", i + 1)?;
            writeln!(f, "Manufacturer: {}", or_null(&iface.manufacturer))?;
            writeln!(f, "Product Name: {}", or_null(&iface.product_name))?;
            writeln!(f, "Serial Number: {}", or_null(&iface.serial_number))?;
            writeln!(f, "VID: 0x{:04X} ({})", iface.vendor_id, iface.vendor_id)?;
            writeln!(f, "PID: 0x{:04X} ({})", iface.product_id, iface.product_id)?;
            writeln!(f, "Device Path: {}", iface.path)?;
            match iface.interface_number {
                Some(n) => writeln!(f, "Interface Number: {n}")?,
                None => writeln!(f, "Interface Number: [NONE]")?,
            }
            writeln!(f, "Usage Page: 0x{:04X}", iface.usage_page)?;
            writeln!(f, "Usage: 0x{:04X}", iface.usage)?;
            writeln!(f, "Max Input Report Length: {}", iface.max_input_report_len)?;
            writeln!(f, "Max Output Report Length: {}", iface.max_output_report_len)?;
            writeln!(f, "COULD BE DUALSENSE: {}", entry.could_be_dualsense())?;
            match &entry.open_result {
                Ok(true) => writeln!(f, "DEVICE CAN BE OPENED: YES")?,
                Ok(false) => writeln!(f, "DEVICE CAN BE OPENED: YES (READ ONLY)")?,
                Err(error) => writeln!(f, "DEVICE CAN BE OPENED: NO - {error}")?,
            }
        }
        Ok(())
    }
}
