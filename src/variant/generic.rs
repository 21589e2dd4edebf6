//! Arena-packed storage for variants with arbitrary alternate sequences.

use crate::variant::Breakpoint;

/// Breakpoints plus a contiguous alternate-sequence arena with offsets.
///
/// `offsets` always holds one more entry than there are records; record `i`'s
/// alternate bytes are `arena[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone)]
pub(crate) struct GenericRecords {
    breakpoints: Vec<Breakpoint>,
    arena: Vec<u8>,
    offsets: Vec<usize>,
}

impl Default for GenericRecords {
    fn default() -> Self {
        GenericRecords {
            breakpoints: Vec::new(),
            arena: Vec::new(),
            offsets: vec![0],
        }
    }
}

impl GenericRecords {
    pub(crate) fn push(&mut self, breakpoint: Breakpoint, alt: &[u8]) -> usize {
        self.breakpoints.push(breakpoint);
        self.arena.extend_from_slice(alt);
        self.offsets.push(self.arena.len());
        self.breakpoints.len() - 1
    }

    pub(crate) fn breakpoint(&self, idx: usize) -> Breakpoint {
        self.breakpoints[idx]
    }

    pub(crate) fn alt(&self, idx: usize) -> &[u8] {
        &self.arena[self.offsets[idx]..self.offsets[idx + 1]]
    }

    pub(crate) fn len(&self) -> usize {
        self.breakpoints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_offsets_partition_the_alternate_bytes() {
        let mut records = GenericRecords::default();
        let del = records.push(Breakpoint::new(4, 8), b"");
        let ins = records.push(Breakpoint::new(4, 4), b"XXX");
        let rep = records.push(Breakpoint::new(10, 12), b"AC");

        assert_eq!(records.len(), 3);
        assert_eq!(records.alt(del), b"");
        assert_eq!(records.alt(ins), b"XXX");
        assert_eq!(records.alt(rep), b"AC");
        assert_eq!(records.breakpoint(rep), Breakpoint::new(10, 12));
    }
}
