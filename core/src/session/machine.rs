//! Machine stage: strings, input, disk interface, ROMs, timers, CPUs and the
//! memory map, followed by the driver's own init hook.

use std::path::Path;

use tracing::debug;

use super::undo::UndoList;
use super::{Ports, Session};
use crate::driver::InitContext;
use crate::error::StepError;
use crate::host::Host;
use crate::storage::StorageAdapter;

/// Variants are in shutdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum MachineResource {
    MemoryMap,
    Regions,
    DiskInterface,
    Cpus,
    LivePorts,
    DefaultPorts,
    InputCodes,
    Strings,
}

pub(super) fn init(
    host: &mut Host,
    storage: &mut StorageAdapter,
    session: &mut Session,
    language_file: Option<&Path>,
) -> Result<UndoList<MachineResource>, StepError> {
    let mut undo = UndoList::new();
    match acquire(host, storage, session, language_file, &mut undo) {
        Ok(()) => Ok(undo),
        Err(err) => {
            debug!(%err, "machine init failed");
            undo.rollback(|resource| release(host, storage, &mut session.ports, resource));
            Err(err)
        }
    }
}

fn acquire(
    host: &mut Host,
    storage: &mut StorageAdapter,
    session: &mut Session,
    language_file: Option<&Path>,
    undo: &mut UndoList<MachineResource>,
) -> Result<(), StepError> {
    let driver = session.driver;

    host.ui
        .load_strings(language_file)
        .map_err(StepError::host("localization"))?;
    undo.push(MachineResource::Strings);

    host.input.init_codes().map_err(StepError::host("input codes"))?;
    undo.push(MachineResource::InputCodes);

    // Drivers without input ports get neither copy.
    if !driver.input_ports.is_empty() {
        let live = host
            .input
            .allocate_ports(driver.input_ports)
            .map_err(StepError::host("input ports"))?;
        session.ports.live = Some(live);
        undo.push(MachineResource::LivePorts);

        let defaults = host
            .input
            .allocate_ports(driver.input_ports)
            .map_err(StepError::host("default input ports"))?;
        session.ports.defaults = Some(defaults);
        undo.push(MachineResource::DefaultPorts);
    }

    storage.attach(driver);
    undo.push(MachineResource::DiskInterface);

    if driver.has_roms() {
        host.memory.load_roms(driver).map_err(StepError::host("rom load"))?;
        undo.push(MachineResource::Regions);
    }

    host.cpu.init_timers();
    host.cpu.init_refresh_timer();

    host.cpu.init(&session.config).map_err(StepError::host("cpu init"))?;
    undo.push(MachineResource::Cpus);

    let Ports { live, defaults } = &mut session.ports;
    session.settings_loaded = host.input.load_settings(
        driver,
        live.as_deref_mut().unwrap_or_default(),
        defaults.as_deref_mut().unwrap_or_default(),
    );
    debug!(loaded = session.settings_loaded, "input settings");

    host.memory.init(&session.config).map_err(StepError::host("memory init"))?;
    undo.push(MachineResource::MemoryMap);

    if let Some(driver_init) = driver.driver_init {
        debug!(driver = driver.name, "driver init");
        driver_init(&mut InitContext {
            driver,
            memory: &mut *host.memory,
            storage,
        });
    }
    Ok(())
}

fn release(host: &mut Host, storage: &mut StorageAdapter, ports: &mut Ports, resource: MachineResource) {
    match resource {
        MachineResource::MemoryMap => host.memory.shutdown(),
        MachineResource::Regions => host.memory.free_regions(),
        MachineResource::DiskInterface => storage.detach(),
        MachineResource::Cpus => host.cpu.exit(),
        MachineResource::LivePorts => {
            if let Some(live) = ports.live.take() {
                host.input.free_ports(live);
            }
        }
        MachineResource::DefaultPorts => {
            if let Some(defaults) = ports.defaults.take() {
                host.input.free_ports(defaults);
            }
        }
        MachineResource::InputCodes => host.input.close_codes(),
        MachineResource::Strings => host.ui.unload_strings(),
    }
}

pub(super) fn teardown(
    host: &mut Host,
    storage: &mut StorageAdapter,
    session: &mut Session,
    undo: UndoList<MachineResource>,
) {
    undo.teardown(|resource| release(host, storage, &mut session.ports, resource));
    host.memory.reset_save_state();
}
