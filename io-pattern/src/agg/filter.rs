use crate::model::{event::IoEvent, filter::FilterConfig};

/// Returns true if `event` passes `filter`. Any matching criterion accepts.
pub fn accept(event: &IoEvent, filter: &FilterConfig) -> bool {
    if !filter.is_enabled() {
        return true;
    }

    filter.device.as_deref() == Some(event.device_id.as_str())
        || filter.file.as_deref() == Some(event.file_path.as_str())
        || filter.mount.as_deref() == Some(event.mount_point.as_str())
        || (filter.reads_only && event.is_read)
        || (filter.writes_only && !event.is_read)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(dev: &str) -> IoEvent {
        IoEvent::new(dev, true, 0, 4096)
    }

    fn write(dev: &str) -> IoEvent {
        IoEvent::new(dev, false, 0, 4096)
    }

    #[test]
    fn disabled_filter_accepts_everything() {
        let filter = FilterConfig::default();
        assert!(accept(&read("sda"), &filter));
        assert!(accept(&write("nvme0n1"), &filter));
    }

    #[test]
    fn device_filter_rejects_other_devices() {
        let filter = FilterConfig {
            device: Some("sda".to_string()),
            ..Default::default()
        };
        assert!(accept(&read("sda"), &filter));
        assert!(accept(&write("sda"), &filter));
        assert!(!accept(&read("sdb"), &filter));
    }

    #[test]
    fn file_and_mount_match_exactly() {
        let filter = FilterConfig {
            file: Some("/var/log/syslog".to_string()),
            ..Default::default()
        };
        assert!(accept(&read("sda").with_file("/var/log/syslog"), &filter));
        assert!(!accept(&read("sda").with_file("/var/log/syslog.1"), &filter));

        let filter = FilterConfig {
            mount: Some("/home".to_string()),
            ..Default::default()
        };
        assert!(accept(&write("sdb").with_mount("/home"), &filter));
        assert!(!accept(&write("sdb").with_mount("/"), &filter));
    }

    #[test]
    fn direction_filters() {
        let reads = FilterConfig {
            reads_only: true,
            ..Default::default()
        };
        assert!(accept(&read("sda"), &reads));
        assert!(!accept(&write("sda"), &reads));

        let writes = FilterConfig {
            writes_only: true,
            ..Default::default()
        };
        assert!(!accept(&read("sda"), &writes));
        assert!(accept(&write("sda"), &writes));
    }

    #[test]
    fn criteria_are_or_ed() {
        // Either a sda event or any read.
        let filter = FilterConfig {
            device: Some("sda".to_string()),
            reads_only: true,
            ..Default::default()
        };
        assert!(accept(&write("sda"), &filter));
        assert!(accept(&read("sdb"), &filter));
        assert!(!accept(&write("sdb"), &filter));
    }
}
