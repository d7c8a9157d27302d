use std::collections::BTreeMap;

use bstr::ByteSlice;
use git_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;

bitflags::bitflags! {
    /// Per-entry flags tracked while an entry lives in the packed-refs cache.
    ///
    /// Mirrors libgit2's `refdb_fs.c` `PACKREF_*` enum bit for bit: these are
    /// cache-internal bookkeeping bits, never serialized to disk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PackedRefFlags: u8 {
        /// `peel` carries a valid, meaningful oid.
        const HAS_PEEL = 1;
        /// This entry was folded in from a loose file during the last repack.
        const WAS_LOOSE = 2;
        /// The packed file's header asserts no peel line can exist for this entry.
        const CANNOT_PEEL = 4;
        /// Hidden behind a loose file of the same name; valid only for the
        /// lifetime of one iterator pass.
        const SHADOWED = 8;
    }
}

/// How thoroughly the packed-refs header claims peel information is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeelingMode {
    /// No peeling trait declared; nothing can be inferred about missing peels.
    #[default]
    None,
    /// `peeled` trait: untagged `refs/tags/` entries without a peel line have
    /// no peel to record.
    Standard,
    /// `fully-peeled` trait: *every* entry without a peel line has no peel to
    /// record, tag or not.
    Full,
}

/// A single entry in the packed-refs file, as held by the in-memory cache.
#[derive(Debug, Clone)]
pub struct PackedEntry {
    pub name: RefName,
    pub oid: ObjectId,
    pub peel: Option<ObjectId>,
    pub flags: PackedRefFlags,
}

impl PackedEntry {
    pub(crate) fn new(name: RefName, oid: ObjectId) -> Self {
        Self {
            name,
            oid,
            peel: None,
            flags: PackedRefFlags::empty(),
        }
    }
}

/// Parse result: the sorted-by-name entry map plus the peeling mode the
/// header declared.
pub struct ParsedPackedRefs {
    pub entries: BTreeMap<RefName, PackedEntry>,
    pub peeling_mode: PeelingMode,
}

/// Parse a packed-refs file's raw bytes.
///
/// Grammar (see module docs for the formal form):
/// ```text
/// file  := header? comment* entry*
/// entry := oid " " name "\n" peel?
/// peel  := "^" oid "\n"
/// ```
/// Any structural error discards partial results and fails with
/// `RefError::CorruptPackedRefs`.
pub fn parse(data: &[u8]) -> Result<ParsedPackedRefs, RefError> {
    let mut entries: BTreeMap<RefName, PackedEntry> = BTreeMap::new();
    let mut peeling_mode = PeelingMode::None;
    let mut last_name: Option<RefName> = None;
    let mut seen_first_line = false;

    for (lineno, line) in data.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let is_first_line = !seen_first_line;
        seen_first_line = true;

        if is_first_line {
            if let Some(rest) = line.strip_prefix(b"# pack-refs with:") {
                peeling_mode = derive_peeling_mode(rest);
                continue;
            }
        }
        if line.starts_with(b"#") {
            continue;
        }

        if let Some(hex) = line.strip_prefix(b"^") {
            let hex = hex
                .to_str()
                .map_err(|_| corrupt(lineno, "peel line is not valid UTF-8"))?;
            let peel_oid = ObjectId::from_hex(hex.trim())
                .map_err(|e| corrupt(lineno, &format!("invalid peel oid: {e}")))?;
            let name = last_name
                .as_ref()
                .ok_or_else(|| corrupt(lineno, "peel line with no preceding entry"))?;
            let entry = entries
                .get_mut(name)
                .expect("last_name always refers to an entry just inserted");
            entry.peel = Some(peel_oid);
            entry.flags.insert(PackedRefFlags::HAS_PEEL);
            continue;
        }

        let space = line
            .find_byte(b' ')
            .ok_or_else(|| corrupt(lineno, "missing space between oid and name"))?;
        let hex = line[..space]
            .to_str()
            .map_err(|_| corrupt(lineno, "oid is not valid UTF-8"))?;
        let oid = ObjectId::from_hex(hex).map_err(|e| corrupt(lineno, &format!("invalid oid: {e}")))?;

        let name_str = line[space + 1..]
            .to_str()
            .map_err(|_| corrupt(lineno, "ref name is not valid UTF-8"))?;
        let name = RefName::new(name_str)
            .map_err(|e| corrupt(lineno, &format!("invalid ref name: {e}")))?;

        entries.insert(name.clone(), PackedEntry::new(name.clone(), oid));
        last_name = Some(name);
    }

    apply_peeling_mode(&mut entries, peeling_mode);

    Ok(ParsedPackedRefs {
        entries,
        peeling_mode,
    })
}

fn derive_peeling_mode(header_rest: &[u8]) -> PeelingMode {
    let traits: Vec<&[u8]> = header_rest.split_str(b" ").filter(|t| !t.is_empty()).collect();
    if traits.iter().any(|t| *t == b"fully-peeled") {
        PeelingMode::Full
    } else if traits.iter().any(|t| *t == b"peeled") {
        PeelingMode::Standard
    } else {
        PeelingMode::None
    }
}

fn apply_peeling_mode(entries: &mut BTreeMap<RefName, PackedEntry>, mode: PeelingMode) {
    for entry in entries.values_mut() {
        if entry.flags.contains(PackedRefFlags::HAS_PEEL) {
            continue;
        }
        let infer_cannot_peel = match mode {
            PeelingMode::None => false,
            PeelingMode::Standard => entry.name.as_str().starts_with("refs/tags/"),
            PeelingMode::Full => true,
        };
        if infer_cannot_peel {
            entry.flags.insert(PackedRefFlags::CANNOT_PEEL);
        }
    }
}

fn corrupt(lineno: usize, reason: &str) -> RefError {
    RefError::CorruptPackedRefs(format!("line {}: {reason}", lineno + 1))
}

/// Serialize entries into the packed-refs wire format. Callers must pass
/// entries already sorted by name (the `RefCache`'s `BTreeMap` iteration
/// order already guarantees this).
///
/// Always declares the `peeled` trait: every entry this crate writes has
/// already had peeling attempted (lazily, at repack time — see the
/// compactor), so a missing peel line on a `refs/tags/` entry is meaningful,
/// not merely unattempted.
pub fn serialize(entries: impl IntoIterator<Item = PackedEntry>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"# pack-refs with: peeled\n");
    for entry in entries {
        out.extend_from_slice(entry.oid.to_hex().as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.name.as_bstr().as_bytes());
        out.push(b'\n');
        if let Some(peel) = entry.peel {
            out.push(b'^');
            out.extend_from_slice(peel.to_hex().as_bytes());
            out.push(b'\n');
        }
    }
    out
}
