//! Portable HID report-descriptor parser.
//!
//! Builds a flat list of input fields from a raw HID report descriptor and
//! decodes input reports against it. It handles:
//! - Global items (usage page, logical range, report size/count/id, push/pop)
//! - Local items (usages, usage ranges)
//! - Input main items: variable fields become elements, constant and array
//!   fields only advance the bit cursor
//!
//! Each variable input field gets a cookie (1-based, descriptor order), which is
//! the element handle the rest of the crate works with.
//!
//! ## Hat policy
//! Hat switches (Generic Desktop `0x39`) are reported in **slots**: `0..7` for the
//! eight directions (Up = 0, clockwise) and `8` for centered. Out-of-range (null
//! state) samples map to `8`; four-way hats are spread onto the even slots.
//! Their element range is therefore always `0..=8`.

use crate::aggregator::HAT_CENTERED;
use crate::event::{Cookie, ElementDesc, ElementKind};
use std::collections::HashMap;

const PAGE_GENERIC_DESKTOP: u16 = 0x01;
const PAGE_SIMULATION: u16 = 0x02;
const PAGE_BUTTON: u16 = 0x09;
const USAGE_HAT_SWITCH: u16 = 0x39;

/// Largest input report accepted per report id, in bits (4 KiB).
const MAX_REPORT_BITS: u64 = 4096 * 8;

/// Largest number of data fields accepted across all reports.
const MAX_FIELDS: u64 = 4096;

/// One variable input field inside an input report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportField {
    pub cookie: Cookie,
    pub report_id: u8,
    /// Offset in bits from the start of the report payload (after the id byte).
    pub bit_offset: u32,
    pub bit_size: u32,
    pub usage_page: u16,
    pub usage: u16,
    pub logical_min: i32,
    pub logical_max: i32,
    pub kind: ElementKind,
}

impl ReportField {
    pub fn is_hat(&self) -> bool {
        self.usage_page == PAGE_GENERIC_DESKTOP && self.usage == USAGE_HAT_SWITCH
    }

    fn signed(&self) -> bool {
        self.logical_min < 0
    }

    /// Read this field's raw value from a report payload.
    ///
    /// Returns `None` if the payload is too short.
    pub fn extract(&self, payload: &[u8]) -> Option<i32> {
        if self.bit_size == 0 || self.bit_size > 32 {
            return None;
        }
        let end_bit = self.bit_offset as usize + self.bit_size as usize;
        if end_bit > payload.len() * 8 {
            return None;
        }

        let mut raw: u64 = 0;
        let first = self.bit_offset as usize / 8;
        let last = (end_bit - 1) / 8;
        for (i, byte) in payload[first..=last].iter().enumerate() {
            raw |= (*byte as u64) << (8 * i);
        }
        raw >>= self.bit_offset % 8;
        let mask = if self.bit_size == 32 {
            u32::MAX as u64
        } else {
            (1u64 << self.bit_size) - 1
        };
        let raw = (raw & mask) as u32;

        let value = if self.signed() && self.bit_size < 32 {
            let shift = 32 - self.bit_size;
            ((raw << shift) as i32) >> shift
        } else {
            raw as i32
        };
        Some(value)
    }

    /// Value as published to the catalog. Identity except for hats (see module docs).
    pub fn published(&self, raw: i32) -> i32 {
        if !self.is_hat() {
            return raw;
        }
        if raw < self.logical_min || raw > self.logical_max {
            return HAT_CENTERED;
        }
        let slot = raw - self.logical_min;
        match self.logical_max - self.logical_min {
            3 => slot * 2,
            _ => slot.min(7),
        }
    }

    pub fn element(&self) -> ElementDesc {
        let (min, max) = if self.is_hat() {
            (0, HAT_CENTERED)
        } else {
            (self.logical_min, self.logical_max)
        };
        ElementDesc {
            cookie: self.cookie,
            kind: self.kind,
            usage_page: self.usage_page,
            usage: self.usage,
            logical_min: min,
            logical_max: max,
            fuzz: 0,
            flat: 0,
        }
    }
}

/// All input fields declared by a descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportLayout {
    pub fields: Vec<ReportField>,
    /// `true` if the descriptor declares report ids, i.e. every report starts with one.
    pub uses_report_ids: bool,
    /// Payload size in bytes per report id (excluding the id byte).
    pub report_sizes: HashMap<u8, usize>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    usage_page: u16,
    logical_min: i32,
    logical_max_raw: u32,
    logical_max_size: usize,
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

impl Globals {
    fn logical_max(&self) -> i32 {
        // A non-negative minimum means the maximum is meant unsigned (0x25 0xFF = 255).
        if self.logical_min >= 0 {
            self.logical_max_raw.min(i32::MAX as u32) as i32
        } else {
            sign_extend(self.logical_max_raw, self.logical_max_size)
        }
    }
}

#[derive(Debug, Default)]
struct Locals {
    usages: Vec<(u16, u16)>,
    usage_min: Option<(u16, u16)>,
    usage_max: Option<(u16, u16)>,
}

impl Locals {
    fn usage_for(&self, index: u32, page: u16) -> (u16, u16) {
        if let Some(&u) = self.usages.get(index as usize) {
            return u;
        }
        if let Some((min_page, min)) = self.usage_min {
            let max = self.usage_max.map(|(_, m)| m).unwrap_or(u16::MAX);
            let usage = (min as u32 + index).min(max as u32) as u16;
            return (min_page, usage);
        }
        self.usages.last().copied().unwrap_or((page, 0))
    }
}

fn sign_extend(value: u32, size: usize) -> i32 {
    match size {
        1 => value as u8 as i8 as i32,
        2 => value as u16 as i16 as i32,
        _ => value as i32,
    }
}

fn split_usage(data: u32, size: usize, page: u16) -> (u16, u16) {
    if size == 4 {
        ((data >> 16) as u16, data as u16)
    } else {
        (page, data as u16)
    }
}

fn classify(page: u16, usage: u16) -> ElementKind {
    match (page, usage) {
        (PAGE_BUTTON, _) => ElementKind::Button,
        (PAGE_GENERIC_DESKTOP, 0x30..=0x39) => ElementKind::Axis,
        (PAGE_SIMULATION, 0xBA | 0xBB | 0xC4 | 0xC5) => ElementKind::Axis,
        _ => ElementKind::Other,
    }
}

impl ReportLayout {
    /// Parse a raw report descriptor.
    pub fn parse(desc: &[u8]) -> Result<Self, String> {
        let mut layout = ReportLayout::default();
        let mut globals = Globals::default();
        let mut stack: Vec<Globals> = Vec::new();
        let mut locals = Locals::default();
        let mut offsets: HashMap<u8, u32> = HashMap::new();
        let mut next_cookie: Cookie = 1;

        let mut i = 0;
        while i < desc.len() {
            let prefix = desc[i];

            // Long item: [0xFE][size][tag][data...]
            if prefix == 0xFE {
                let size = *desc.get(i + 1).ok_or("truncated long item")? as usize;
                i += 3 + size;
                continue;
            }

            let size = match prefix & 0x03 {
                3 => 4,
                n => n as usize,
            };
            let kind = (prefix >> 2) & 0x03;
            let tag = prefix >> 4;
            let bytes = desc
                .get(i + 1..i + 1 + size)
                .ok_or_else(|| format!("truncated item at byte {i}"))?;
            let data = bytes
                .iter()
                .enumerate()
                .fold(0u32, |acc, (n, b)| acc | (*b as u32) << (8 * n));
            i += 1 + size;

            match (kind, tag) {
                // Main items
                (0, 0x8) => {
                    let constant = data & 0x01 != 0;
                    let variable = data & 0x02 != 0;
                    let offset = offsets.entry(globals.report_id).or_insert(0);
                    let span = globals.report_size as u64 * globals.report_count as u64;
                    if *offset as u64 + span > MAX_REPORT_BITS {
                        return Err(format!(
                            "report too large (id {}, {} bits)",
                            globals.report_id,
                            *offset as u64 + span
                        ));
                    }
                    if constant || !variable {
                        *offset += span as u32;
                        locals = Locals::default();
                        continue;
                    }
                    if layout.fields.len() as u64 + globals.report_count as u64 > MAX_FIELDS {
                        return Err(format!("report too large ({} fields)", layout.fields.len()));
                    }
                    for n in 0..globals.report_count {
                        let (page, usage) = locals.usage_for(n, globals.usage_page);
                        let logical_max = globals.logical_max();
                        // An axis without a usable range cannot be calibrated.
                        let kind = match classify(page, usage) {
                            ElementKind::Axis if logical_max <= globals.logical_min => {
                                ElementKind::Other
                            }
                            kind => kind,
                        };
                        layout.fields.push(ReportField {
                            cookie: next_cookie,
                            report_id: globals.report_id,
                            bit_offset: *offset,
                            bit_size: globals.report_size,
                            usage_page: page,
                            usage,
                            logical_min: globals.logical_min,
                            logical_max,
                            kind,
                        });
                        next_cookie += 1;
                        *offset += globals.report_size;
                    }
                    locals = Locals::default();
                }
                (0, 0x9) | (0, 0xB) | (0, 0xA) | (0, 0xC) => {
                    locals = Locals::default();
                }
                // Global items
                (1, 0x0) => globals.usage_page = data as u16,
                (1, 0x1) => globals.logical_min = sign_extend(data, size),
                (1, 0x2) => {
                    globals.logical_max_raw = data;
                    globals.logical_max_size = size;
                }
                (1, 0x7) => globals.report_size = data,
                (1, 0x8) => {
                    globals.report_id = data as u8;
                    layout.uses_report_ids = true;
                }
                (1, 0x9) => globals.report_count = data,
                (1, 0xA) => stack.push(globals),
                (1, 0xB) => {
                    globals = stack.pop().ok_or("pop without push")?;
                }
                // Local items
                (2, 0x0) => locals
                    .usages
                    .push(split_usage(data, size, globals.usage_page)),
                (2, 0x1) => locals.usage_min = Some(split_usage(data, size, globals.usage_page)),
                (2, 0x2) => locals.usage_max = Some(split_usage(data, size, globals.usage_page)),
                _ => {}
            }
        }

        for (id, bits) in offsets {
            layout.report_sizes.insert(id, bits.div_ceil(8) as usize);
        }
        Ok(layout)
    }

    /// Elements in cookie order.
    pub fn elements(&self) -> Vec<ElementDesc> {
        self.fields.iter().map(ReportField::element).collect()
    }

    /// Largest input report in bytes, including the id byte when ids are used.
    pub fn max_report_len(&self) -> usize {
        let payload = self.report_sizes.values().copied().max().unwrap_or(0);
        payload + usize::from(self.uses_report_ids)
    }

    /// Split a report as read from the device into `(report_id, payload)`.
    pub fn split<'a>(&self, report: &'a [u8]) -> (u8, &'a [u8]) {
        if self.uses_report_ids {
            match report.split_first() {
                Some((id, rest)) => (*id, rest),
                None => (0, &[]),
            }
        } else {
            (0, report)
        }
    }

    /// Fields carried by reports with this id.
    pub fn fields_for(&self, report_id: u8) -> impl Iterator<Item = &ReportField> {
        self.fields.iter().filter(move |f| f.report_id == report_id)
    }
}
