//! Driver registry for front-end discovery.
//!
//! Each driver self-registers via [`inventory::submit!`] with a
//! [`DriverEntry`]. The front-end finds drivers at runtime without any
//! central list.

use marquee_core::driver::DriverDescriptor;

/// A driver the front-end can launch.
pub struct DriverEntry {
    pub driver: &'static DriverDescriptor,
}

impl DriverEntry {
    pub const fn new(driver: &'static DriverDescriptor) -> Self {
        Self { driver }
    }

    pub fn name(&self) -> &'static str {
        self.driver.name
    }
}

inventory::collect!(DriverEntry);

/// Every registered driver, sorted by name.
pub fn all() -> Vec<&'static DriverDescriptor> {
    let mut drivers: Vec<_> = inventory::iter::<DriverEntry>
        .into_iter()
        .map(|entry| entry.driver)
        .collect();
    drivers.sort_by_key(|driver| driver.name);
    drivers
}

/// Look up a driver by its short name.
pub fn find(name: &str) -> Option<&'static DriverDescriptor> {
    inventory::iter::<DriverEntry>
        .into_iter()
        .find(|entry| entry.name() == name)
        .map(|entry| entry.driver)
}

/// Registered drivers whose parent is `name`.
pub fn clones_of(name: &str) -> Vec<&'static DriverDescriptor> {
    all()
        .into_iter()
        .filter(|driver| driver.clone_of.is_some_and(|parent| parent.name == name))
        .collect()
}
