pub const DBUS_NAME_SYNC: &str = "dev.dashmark.Sync1";
pub const DBUS_INTERFACE_SYNC: &str = "dev.dashmark.Sync1";
pub const DBUS_OBJECT_PATH_SYNC: &str = "/dev/dashmark/Sync1";
