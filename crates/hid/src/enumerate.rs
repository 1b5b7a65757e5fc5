//! Enumeration driver
//!
//! Walks the device-node tree, runs the descriptor walker on every node and
//! hands each HID interface found to the caller. A node that cannot be read or
//! parsed is logged, recorded in the [`ScanReport`] and skipped. Nothing is
//! cached: every walk re-reads every node and produces fresh handles.

use crate::config::HidConfig;
use crate::device::{DeviceContext, HidDevice};
use crate::transport::Backend;
use crate::walker::DescriptorWalker;
use common::{Diagnostics, Error, diagnostic_sink};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A node the scan had to skip
#[derive(Debug)]
pub struct NodeFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of one enumeration pass
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Device nodes read, including ones that failed to parse
    pub nodes_scanned: usize,
    /// HID interfaces handed to the callback
    pub devices_found: usize,
    pub failures: Vec<NodeFailure>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &Path, error: impl Into<Error>) {
        let error = error.into();
        warn!("Skipping {}: {}", path.display(), error);
        self.failures.push(NodeFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

#[derive(Debug, Clone)]
pub struct Enumerator {
    config: HidConfig,
    context: DeviceContext,
}

impl Enumerator {
    /// Enumerator over the real usbfs backend
    ///
    /// A `log_level` in `config` routes diagnostics to a stderr sink at that
    /// level.
    pub fn new(config: HidConfig) -> common::Result<Self> {
        let mut context = DeviceContext::from_config(&config);
        if let Some(level) = &config.log_level {
            context = context.with_diagnostics(Diagnostics::from(diagnostic_sink(level)?));
        }
        Ok(Self { config, context })
    }

    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.context = self.context.with_backend(backend);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.context = self.context.with_diagnostics(diagnostics);
        self
    }

    pub fn config(&self) -> &HidConfig {
        &self.config
    }

    /// Hand every HID interface under the device root to `callback`
    pub fn walk<F>(&self, mut callback: F) -> ScanReport
    where
        F: FnMut(HidDevice),
    {
        self.context.diagnostics().in_scope(|| {
            let mut report = ScanReport::default();
            self.visit_dir(&self.config.device_root, &mut report, &mut callback);
            debug!(
                "Scanned {} nodes under {}: {} HID interfaces, {} failures",
                report.nodes_scanned,
                self.config.device_root.display(),
                report.devices_found,
                report.failures.len()
            );
            report
        })
    }

    /// Collect every HID interface under the device root
    pub fn devices(&self) -> Vec<HidDevice> {
        let mut devices = Vec::new();
        self.walk(|device| devices.push(device));
        devices
    }

    /// The first HID interface matching `predicate`
    pub fn find<P>(&self, mut predicate: P) -> Option<HidDevice>
    where
        P: FnMut(&HidDevice) -> bool,
    {
        let mut found = None;
        self.walk(|device| {
            if found.is_none() && predicate(&device) {
                found = Some(device);
            }
        });
        found
    }

    fn visit_dir(&self, dir: &Path, report: &mut ScanReport, callback: &mut dyn FnMut(HidDevice)) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => return report.fail(dir, e),
        };

        let mut children = Vec::new();
        for entry in entries {
            match entry.and_then(|e| Ok((e.path(), e.file_type()?))) {
                Ok(child) => children.push(child),
                Err(e) => report.fail(dir, e),
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in children {
            if file_type.is_dir() {
                self.visit_dir(&path, report, callback);
            } else {
                self.visit_node(&path, report, callback);
            }
        }
    }

    fn visit_node(&self, path: &Path, report: &mut ScanReport, callback: &mut dyn FnMut(HidDevice)) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return report.fail(path, e),
        };
        report.nodes_scanned += 1;

        for result in DescriptorWalker::new(&bytes, path, self.context.clone()) {
            match result {
                Ok(device) => {
                    report.devices_found += 1;
                    callback(device);
                }
                Err(e) => report.fail(path, e),
            }
        }
    }
}

impl Default for Enumerator {
    fn default() -> Self {
        let config = HidConfig::default();
        Self {
            context: DeviceContext::from_config(&config),
            config,
        }
    }
}

/// Enumerate `/dev/bus/usb` with default settings
pub fn enumerate<F>(callback: F) -> ScanReport
where
    F: FnMut(HidDevice),
{
    Enumerator::default().walk(callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use common::test_utils::DescriptorStream;

    fn enumerator(root: &Path) -> Enumerator {
        let config = HidConfig {
            device_root: root.to_path_buf(),
            ..Default::default()
        };
        Enumerator::new(config).unwrap()
    }

    fn node(vendor_id: u16) -> Vec<u8> {
        DescriptorStream::new()
            .device(vendor_id, 0x0001, 0x0100)
            .config()
            .hid_interface(0)
            .endpoint(0x81, 8)
            .build()
    }

    #[test]
    fn test_missing_root_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let report = enumerator(&dir.path().join("absent")).walk(|_| panic!("no devices"));

        assert_eq!(report.nodes_scanned, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, Error::Io(_)));
    }

    #[test]
    fn test_nodes_visited_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let bus = dir.path().join("001");
        fs::create_dir(&bus).unwrap();
        fs::write(bus.join("003"), node(0x0003)).unwrap();
        fs::write(bus.join("001"), node(0x0001)).unwrap();
        fs::write(bus.join("002"), node(0x0002)).unwrap();

        let mut vendors = Vec::new();
        let report = enumerator(dir.path()).walk(|d| vendors.push(d.info().vendor_id));

        assert!(report.is_clean());
        assert_eq!(report.nodes_scanned, 3);
        assert_eq!(report.devices_found, 3);
        assert_eq!(vendors, vec![0x0001, 0x0002, 0x0003]);
    }

    #[test]
    fn test_find_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("001"), node(0x1111)).unwrap();
        fs::write(dir.path().join("002"), node(0x2222)).unwrap();

        let enumerator = enumerator(dir.path());
        let found = enumerator.find(|d| d.info().vendor_id == 0x2222).unwrap();
        assert_eq!(found.path(), dir.path().join("002").as_path());
        assert!(enumerator.find(|d| d.info().vendor_id == 0x3333).is_none());
        assert_eq!(enumerator.devices().len(), 2);
    }

    #[test]
    fn test_invalid_log_level() {
        let config = HidConfig {
            log_level: Some("hid=loudest".to_string()),
            ..Default::default()
        };
        assert!(matches!(Enumerator::new(config), Err(Error::Config(_))));
    }
}
