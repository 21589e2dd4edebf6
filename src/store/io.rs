//! The binary store file: header, reference bytes, variant table.
//!
//! All fields are little-endian. Layout:
//! `magic "RCMS" | version u32 | members u64 | ref_len u64 | variants u64 |`
//! reference bytes, then per variant (in composite-key order):
//! `low u64 | high u64 | alt_len u64 |` alt bytes `|` coverage bitmap of
//! `ceil(members / 8)` bytes, LSB-first.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::coverage::Coverage;
use crate::errors::{Error, Result};
use crate::store::Pangenome;
use crate::variant::{compare_keys, Breakpoint, Variant};

pub(crate) const MAGIC: &[u8; 4] = b"RCMS";
pub(crate) const VERSION: u32 = 1;

impl Pangenome {
    /// Load a store from a file on disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("unable to open store file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("unable to load store file {}", path.display()))
    }

    /// Write the store to a file on disk.
    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("unable to create store file {}", path.display()))?;
        self.to_writer(BufWriter::new(file))
            .with_context(|| format!("unable to write store file {}", path.display()))
    }

    /// Load a store from its binary file representation.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::malformed("bad magic"));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(Error::malformed(format!(
                "unsupported version {}",
                version
            )));
        }
        let members = reader.read_u64::<LittleEndian>()? as usize;
        if members == 0 {
            return Err(Error::malformed("population of size zero"));
        }
        let ref_len = reader.read_u64::<LittleEndian>()? as usize;
        let variant_count = reader.read_u64::<LittleEndian>()? as usize;

        let mut reference = vec![0u8; ref_len];
        reader.read_exact(&mut reference)?;

        let mut store = Pangenome::new(reference, members);
        let coverage_bytes = (members + 7) / 8;
        let mut last_key: Option<(usize, usize, Vec<u8>)> = None;
        for record in 0..variant_count {
            let low = reader.read_u64::<LittleEndian>()? as usize;
            let high = reader.read_u64::<LittleEndian>()? as usize;
            if low > high {
                return Err(Error::malformed(format!(
                    "record {}: low breakend {} above high breakend {}",
                    record, low, high
                )));
            }
            let alt_len = reader.read_u64::<LittleEndian>()? as usize;
            let mut alt = vec![0u8; alt_len];
            reader.read_exact(&mut alt)?;
            let mut bitmap = vec![0u8; coverage_bytes];
            reader.read_exact(&mut bitmap)?;

            if let Some((last_low, last_high, last_alt)) = &last_key {
                if compare_keys((*last_low, *last_high, last_alt), (low, high, &alt))
                    == Ordering::Greater
                {
                    return Err(Error::malformed(format!(
                        "record {}: variant table out of order",
                        record
                    )));
                }
            }
            last_key = Some((low, high, alt.clone()));

            let mut coverage = Coverage::with_domain(members, false);
            for member in 0..members {
                if bitmap[member / 8] >> (member % 8) & 1 == 1 {
                    coverage.set(member, true);
                }
            }
            store.insert(Variant::new(Breakpoint::new(low, high), alt, coverage))?;
        }
        debug_assert!(store.records().is_sorted());
        debug!(
            "loaded store: {} members, reference of {} bp, {} variants",
            members,
            store.source().len(),
            store.variant_count()
        );
        Ok(store)
    }

    /// Write the store in its binary file representation.
    pub fn to_writer<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        writer.write_u64::<LittleEndian>(self.size() as u64)?;
        writer.write_u64::<LittleEndian>(self.source().len() as u64)?;
        writer.write_u64::<LittleEndian>(self.variant_count() as u64)?;
        writer.write_all(self.source())?;

        let coverage_bytes = (self.size() + 7) / 8;
        for variant in self.iter() {
            writer.write_u64::<LittleEndian>(variant.low() as u64)?;
            writer.write_u64::<LittleEndian>(variant.high() as u64)?;
            writer.write_u64::<LittleEndian>(variant.alt().len() as u64)?;
            writer.write_all(variant.alt())?;
            let mut bitmap = vec![0u8; coverage_bytes];
            for member in variant.coverage().members() {
                bitmap[member / 8] |= 1 << (member % 8);
            }
            writer.write_all(&bitmap)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_store() -> Pangenome {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 3);
        store
            .insert(Variant::new(
                Breakpoint::new(4, 8),
                vec![],
                Coverage::from_members(vec![0, 1], 3),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(12, 12),
                b"ACG".to_vec(),
                Coverage::from_members(vec![2], 3),
            ))
            .unwrap();
        store
    }

    #[test]
    fn round_trip_preserves_records() {
        let store = example_store();
        let mut buffer = Vec::new();
        store.to_writer(&mut buffer).unwrap();
        let loaded = Pangenome::from_reader(&buffer[..]).unwrap();

        assert_eq!(loaded.size(), 3);
        assert_eq!(loaded.source(), store.source());
        assert_eq!(loaded.variant_count(), 2);
        for (a, b) in loaded.iter().zip(store.iter()) {
            assert_eq!(a.breakpoint(), b.breakpoint());
            assert_eq!(a.alt(), b.alt());
            assert_eq!(a.coverage(), b.coverage());
        }
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut buffer = Vec::new();
        example_store().to_writer(&mut buffer).unwrap();
        buffer[0] = b'X';
        assert!(matches!(
            Pangenome::from_reader(&buffer[..]),
            Err(Error::StoreMalformed { .. })
        ));
    }

    #[test]
    fn truncated_file_is_fatal() {
        let mut buffer = Vec::new();
        example_store().to_writer(&mut buffer).unwrap();
        buffer.truncate(buffer.len() - 3);
        assert!(matches!(
            Pangenome::from_reader(&buffer[..]),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn unsorted_table_is_fatal() {
        // hand-build a file with two records in the wrong order
        let mut store = Pangenome::new(b"ACGTACGT".to_vec(), 1);
        store
            .insert(Variant::snv(2, b'T', Coverage::with_domain(1, true)))
            .unwrap();
        store
            .insert(Variant::snv(5, b'A', Coverage::with_domain(1, true)))
            .unwrap();
        let mut buffer = Vec::new();
        store.to_writer(&mut buffer).unwrap();
        // records start after header (4 + 4 + 3 * 8) and reference (8 bytes);
        // each record is 8 + 8 + 8 + 1 + 1 bytes
        let records_at = 4 + 4 + 24 + 8;
        let record_len = 26;
        let (head, tail) = buffer.split_at_mut(records_at + record_len);
        head[records_at..].swap_with_slice(&mut tail[..record_len]);
        assert!(matches!(
            Pangenome::from_reader(&buffer[..]),
            Err(Error::StoreMalformed { .. })
        ));
    }
}
