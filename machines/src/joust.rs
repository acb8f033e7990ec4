use marquee_core::driver::{DriverDescriptor, InputPortDef, RomEntry, RomRegion};

use crate::registry::DriverEntry;
use crate::williams::{DECODER_REGION, SOUND_REGION, construct_williams};

// ---------------------------------------------------------------------------
// Joust ROM definitions
//
// Three label variants exist: Green (parent "joust"), Yellow ("jousty"),
// Red ("joustr"). All use the parent's file names; only the contents of
// some chips differ.
// ---------------------------------------------------------------------------

const fn rom(name: &'static str, offset: usize, crc32: u32) -> RomEntry {
    RomEntry { name, size: 0x1000, offset, crc32: Some(crc32) }
}

/// Fixed program ROMs at 0xD000-0xFFFF.
const fn program(a7: u32, c7: u32, e7: u32) -> [RomEntry; 3] {
    [
        rom("joust_rom_10b_3006-22.a7", 0xD000, a7),
        rom("joust_rom_11b_3006-23.c7", 0xE000, c7),
        rom("joust_rom_12b_3006-24.e7", 0xF000, e7),
    ]
}

/// Banked program ROMs that overlay video RAM at 0x0000-0x8FFF.
const fn banked(e5: u32, a5: u32, e6: u32, c6: u32, a6: u32) -> [RomEntry; 9] {
    [
        rom("joust_rom_1b_3006-13.e4", 0x0000, 0xfe41b2af),
        rom("joust_rom_2b_3006-14.c4", 0x1000, 0x501c143c),
        rom("joust_rom_3b_3006-15.a4", 0x2000, 0x43f7161d),
        rom("joust_rom_4b_3006-16.e5", 0x3000, e5),
        rom("joust_rom_5b_3006-17.c5", 0x4000, 0xc686bb6b),
        rom("joust_rom_6b_3006-18.a5", 0x5000, a5),
        rom("joust_rom_7b_3006-19.e6", 0x6000, e6),
        rom("joust_rom_8b_3006-20.c6", 0x7000, c6),
        rom("joust_rom_9b_3006-21.a6", 0x8000, a6),
    ]
}

static GREEN_PROGRAM: [RomEntry; 3] = program(0x3f1c4f89, 0xea48b359, 0xc710717b);
static GREEN_BANKED: [RomEntry; 9] = banked(0xdb5571b6, 0xfac5f2cf, 0x81418240, 0xba5359ba, 0x39643147);

static YELLOW_PROGRAM: [RomEntry; 3] = program(0x2039014a, 0xea48b359, 0xc710717b);
static YELLOW_BANKED: [RomEntry; 9] = banked(0xdb5571b6, 0xfac5f2cf, 0xe6f439c4, 0xba5359ba, 0x39643147);

static RED_PROGRAM: [RomEntry; 3] = program(0xc0c6e52a, 0xab11bcf9, 0xea14574b);
static RED_BANKED: [RomEntry; 9] = banked(0xab347170, 0x3d9a6fac, 0x0a70b3d1, 0xa7f01504, 0x978687ad);

const fn regions(program: &'static [RomEntry], banked: &'static [RomEntry]) -> [RomRegion; 4] {
    [
        RomRegion { tag: "maincpu", size: 0x10000, dispose: false, entries: program },
        RomRegion { tag: "banked", size: 0x9000, dispose: false, entries: banked },
        SOUND_REGION,
        DECODER_REGION,
    ]
}

static GREEN_ROMS: [RomRegion; 4] = regions(&GREEN_PROGRAM, &GREEN_BANKED);
static YELLOW_ROMS: [RomRegion; 4] = regions(&YELLOW_PROGRAM, &YELLOW_BANKED);
static RED_ROMS: [RomRegion; 4] = regions(&RED_PROGRAM, &RED_BANKED);

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

static JOUST_PORTS: [InputPortDef; 3] = [
    // Widget PIA A through the LS157 mux: left, right, flap, then both starts.
    InputPortDef { name: "IN0", mask: 0x37, default: 0x00 },
    // Second player's half of the mux.
    InputPortDef { name: "IN1", mask: 0x07, default: 0x00 },
    // ROM PIA A: auto-up, advance, high-score reset, left coin, centre coin, right coin, slam, tilt.
    InputPortDef { name: "IN2", mask: 0xFF, default: 0x00 },
];

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

const JOUST_BASE: DriverDescriptor = DriverDescriptor {
    name: "joust",
    description: "Joust (Green label)",
    year: "1982",
    manufacturer: "Williams",
    clone_of: None,
    construct: construct_williams,
    driver_init: None,
    roms: &GREEN_ROMS,
    input_ports: &JOUST_PORTS,
};

/// Joust (Williams, 1982). M6809 main board with battery-backed CMOS for
/// settings and high scores.
pub static JOUST: DriverDescriptor = JOUST_BASE;

pub static JOUSTY: DriverDescriptor = DriverDescriptor {
    name: "jousty",
    description: "Joust (Yellow label)",
    clone_of: Some(&JOUST),
    roms: &YELLOW_ROMS,
    ..JOUST_BASE
};

pub static JOUSTR: DriverDescriptor = DriverDescriptor {
    name: "joustr",
    description: "Joust (Red label)",
    clone_of: Some(&JOUST),
    roms: &RED_ROMS,
    ..JOUST_BASE
};

inventory::submit! { DriverEntry::new(&JOUST) }
inventory::submit! { DriverEntry::new(&JOUSTY) }
inventory::submit! { DriverEntry::new(&JOUSTR) }
