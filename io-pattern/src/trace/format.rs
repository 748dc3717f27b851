use std::collections::HashMap;

use anyhow::{Result, anyhow};

/// Field layout of a tracepoint, parsed from its tracefs `format` file:
///
/// ```text
///     field:dev_t dev;    offset:8;    size:4;    signed:0;
/// ```
#[derive(Debug, Default)]
pub struct TracepointFormat {
    fields: HashMap<String, FieldSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub offset: u32,
    pub size: u32,
}

impl TracepointFormat {
    pub fn parse(content: &str) -> Self {
        let fields = content.lines().filter_map(parse_field_line).collect();
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<FieldSpec> {
        self.fields.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<u32> {
        self.field(name)
            .map(|f| f.offset)
            .ok_or_else(|| anyhow!("tracepoint has no `{name}` field"))
    }
}

fn parse_field_line(line: &str) -> Option<(String, FieldSpec)> {
    let mut decl = None;
    let mut offset = None;
    let mut size = None;

    for part in line.split(';') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("field:") {
            decl = Some(v);
        } else if let Some(v) = part.strip_prefix("offset:") {
            offset = v.parse().ok();
        } else if let Some(v) = part.strip_prefix("size:") {
            size = v.parse().ok();
        }
    }

    // "char rwbs[8]" -> "rwbs", "__data_loc char[] cmd" -> "cmd"
    let name = decl?.split_whitespace().last()?;
    let name = name.split('[').next()?;
    Some((
        name.to_string(),
        FieldSpec {
            offset: offset?,
            size: size?,
        },
    ))
}

/// Offsets the kernel program needs from `block:block_rq_complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRqOffsets {
    pub dev: u32,
    pub sector: u32,
    pub nr_sector: u32,
    pub rwbs: u32,
}

impl BlockRqOffsets {
    pub fn from_format(format: &TracepointFormat) -> Result<Self> {
        Ok(Self {
            dev: format.require("dev")?,
            sector: format.require("sector")?,
            nr_sector: format.require("nr_sector")?,
            rwbs: format.require("rwbs")?,
        })
    }

    /// In the order of the kernel program's FIELD_OFFSETS slots.
    pub fn as_slots(&self) -> [u32; 4] {
        [self.dev, self.sector, self.nr_sector, self.rwbs]
    }
}
