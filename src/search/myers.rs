//! Bit-parallel approximate prefix matching with resumable state.
//!
//! A single-word Myers automaton: the pattern is anchored at the start of the
//! haystack and the running score after `j` consumed symbols is the edit
//! distance between the full pattern and `haystack[0..j]`. The mutable part
//! of the automaton is three words, cheap to capture before a branch fork and
//! to restore when the fork is resumed.

/// The resumable part of the automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyersState {
    pv: u64,
    mv: u64,
    score: usize,
}

/// Pattern-dependent tables plus the stepping rule.
pub struct RestorableMyers {
    peq: [u64; 256],
    hmask: u64,
    length: usize,
}

/// Longest pattern a single automaton word can hold.
pub const MAX_PATTERN_LEN: usize = 64;

impl RestorableMyers {
    pub fn new(pattern: &[u8]) -> Self {
        assert!(
            !pattern.is_empty() && pattern.len() <= MAX_PATTERN_LEN,
            "bug: pattern length outside the automaton word"
        );
        let mut peq = [0u64; 256];
        for (i, &symbol) in pattern.iter().enumerate() {
            peq[symbol as usize] |= 1 << i;
        }
        RestorableMyers {
            peq,
            hmask: 1 << (pattern.len() - 1),
            length: pattern.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    /// The state before any haystack symbol: distance = pattern length.
    pub fn start(&self) -> MyersState {
        MyersState {
            pv: if self.length == 64 {
                !0
            } else {
                (1u64 << self.length) - 1
            },
            mv: 0,
            score: self.length,
        }
    }

    /// Consume one haystack symbol and return the updated prefix distance.
    pub fn step(&self, state: &mut MyersState, symbol: u8) -> usize {
        let eq = self.peq[symbol as usize];
        let xv = eq | state.mv;
        let xh = (((eq & state.pv).wrapping_add(state.pv)) ^ state.pv) | eq;
        let ph = state.mv | !(xh | state.pv);
        let mh = state.pv & xh;

        if ph & self.hmask != 0 {
            state.score += 1;
        } else if mh & self.hmask != 0 {
            state.score -= 1;
        }

        // the +1 carry keeps the first row at D[0][j] = j (prefix anchoring)
        let ph = ph << 1 | 1;
        let mh = mh << 1;
        state.pv = mh | !(xv | ph);
        state.mv = ph & xv;
        state.score
    }

    pub fn score(&self, state: &MyersState) -> usize {
        state.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bio::alignment::distance::levenshtein;

    fn prefix_scores(pattern: &[u8], haystack: &[u8]) -> Vec<usize> {
        let myers = RestorableMyers::new(pattern);
        let mut state = myers.start();
        haystack
            .iter()
            .map(|&symbol| myers.step(&mut state, symbol))
            .collect()
    }

    #[test]
    fn scores_equal_prefix_edit_distances() {
        let pattern = b"GAGG";
        let haystack = b"GGGGTACG";
        let scores = prefix_scores(pattern, haystack);
        for (j, &score) in scores.iter().enumerate() {
            let expected = levenshtein(pattern, &haystack[..j + 1]) as usize;
            assert_eq!(score, expected, "prefix length {}", j + 1);
        }
    }

    #[test]
    fn exact_match_reaches_zero() {
        let scores = prefix_scores(b"ACGT", b"ACGT");
        assert_eq!(scores, vec![3, 2, 1, 0]);
    }

    #[test]
    fn capture_and_restore_fork_the_automaton() {
        let myers = RestorableMyers::new(b"CCGG");
        let mut state = myers.start();
        myers.step(&mut state, b'C');
        myers.step(&mut state, b'C');
        let fork = state.clone();

        myers.step(&mut state, b'G');
        myers.step(&mut state, b'G');
        assert_eq!(myers.score(&state), 0);

        // resume the fork along another branch
        let mut state = fork;
        myers.step(&mut state, b'T');
        myers.step(&mut state, b'G');
        assert_eq!(
            myers.score(&state),
            levenshtein(b"CCGG", b"CCTG") as usize
        );
    }

    #[test]
    fn random_prefixes_match_the_oracle() {
        use rand::prelude::*;
        let mut rng = StdRng::seed_from_u64(42);
        let alphabet = b"ACGT";
        for _ in 0..50 {
            let pattern: Vec<u8> = (0..rng.gen_range(1, 12))
                .map(|_| *alphabet.choose(&mut rng).unwrap())
                .collect();
            let haystack: Vec<u8> = (0..rng.gen_range(0, 20))
                .map(|_| *alphabet.choose(&mut rng).unwrap())
                .collect();
            let scores = prefix_scores(&pattern, &haystack);
            for (j, &score) in scores.iter().enumerate() {
                assert_eq!(score, levenshtein(&pattern, &haystack[..j + 1]) as usize);
            }
        }
    }
}
