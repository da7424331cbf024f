use crate::index::MismatchBudget;

/// Where an index landed on a candidate tag and at what cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    pub ref_start: usize,
    pub ref_stop: usize,
    pub query_stop: usize,
    pub errors: usize,
}

/// Semi-global aligner for one index; accepts `span >= len - max_errors` within rate `max_errors / len`.
#[derive(Debug, Clone)]
pub struct Aligner {
    reference: Vec<u8>,
    max_errors: usize,
    min_overlap: usize,
}

impl Aligner {
    pub fn new(reference: &[u8], max_errors: usize) -> Self {
        Self { reference: reference.to_vec(), max_errors, min_overlap: reference.len().saturating_sub(max_errors) }
    }

    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    pub fn min_overlap(&self) -> usize {
        self.min_overlap
    }

    pub fn max_error_rate(&self) -> f64 {
        if self.reference.is_empty() { return 0.0; }
        self.max_errors as f64 / self.reference.len() as f64
    }

    fn accepts(&self, span: usize, errors: usize) -> bool {
        span >= self.min_overlap && errors * self.reference.len() <= self.max_errors * span
    }

    /// Best qualifying alignment of the index against `query`: fewest errors, then longest span.
    pub fn locate(&self, query: &[u8]) -> Option<Alignment> {
        let m = self.reference.len();
        let n = query.len();
        let mut best: Option<Alignment> = None;
        if self.min_overlap == 0 {
            best = Some(Alignment { ref_start: 0, ref_stop: 0, query_stop: 0, errors: 0 });
        }
        let mut prev = vec![0usize; n + 1];
        let mut cur = vec![0usize; n + 1];
        for start in 0..=(m - self.min_overlap) {
            prev.iter_mut().for_each(|c| *c = 0);
            for i in start..m {
                let span = i + 1 - start;
                cur[0] = span;
                for j in 1..=n {
                    let diag = prev[j - 1] + usize::from(self.reference[i] != query[j - 1]);
                    cur[j] = diag.min(prev[j] + 1).min(cur[j - 1] + 1);
                }
                let (query_stop, errors) = cur.iter().copied().enumerate().min_by_key(|&(_, c)| c).unwrap_or((0, span));
                if self.accepts(span, errors) {
                    let candidate = Alignment { ref_start: start, ref_stop: i + 1, query_stop, errors };
                    best = match best {
                        Some(b) if (b.errors, std::cmp::Reverse(b.ref_stop - b.ref_start)) <= (errors, std::cmp::Reverse(span)) => Some(b),
                        _ => Some(candidate),
                    };
                }
                std::mem::swap(&mut prev, &mut cur);
            }
        }
        best
    }
}

/// Each side is checked against its own budget.
#[derive(Debug, Clone)]
pub struct ApproximateMatcher {
    aligner_a: Aligner,
    aligner_b: Aligner,
}

impl ApproximateMatcher {
    pub fn new(index_a: &[u8], index_b: &[u8], budget: MismatchBudget) -> Self {
        Self { aligner_a: Aligner::new(index_a, budget.on_a), aligner_b: Aligner::new(index_b, budget.on_b) }
    }

    pub fn aligners(&self) -> (&Aligner, &Aligner) {
        (&self.aligner_a, &self.aligner_b)
    }

    pub fn matches(&self, read_a: &[u8], read_b: &[u8]) -> bool {
        if read_a.len() != self.aligner_a.reference().len() || read_b.len() != self.aligner_b.reference().len() {
            return false;
        }
        if self.aligner_a.locate(read_a).is_none() {
            return false;
        }
        self.aligner_b.locate(read_b).is_some()
    }
}
