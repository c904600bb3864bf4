//! Adaptive probabilistic models for binary sources.
//!
//! The [`BinaryModel`] trait is the interface the arithmetic coders in [`crate::coder`]
//! are driven by: a supplier of the probability that the next bit is zero, plus a sink
//! for the bits that actually occurred. [`Ctw`] is the Context Tree Weighting
//! realization of that interface; [`CtwReverter`] adds multi-step speculation on top of
//! a borrowed `Ctw` for predictive applications that need to roll the model forward
//! hypothetically and undo it again.

use smallvec::SmallVec;

use crate::tree::{ContextTree, Traversal};

/// A probabilistic model on a sequence of bits.
///
/// Implementations must be deterministic: two successive [`prob0`](Self::prob0) calls
/// with no intervening [`observe`](Self::observe) return bit-identical floats, and the
/// returned probability always lies strictly between zero and one. `prob0` takes
/// `&mut self` because adaptive models may compute it by a speculative update that is
/// rolled back before returning; no observable state may change.
pub trait BinaryModel {
    /// The probability that the next bit of the sequence is zero.
    fn prob0(&mut self) -> f64;

    /// Informs the model that `bit` was observed from the sequence.
    fn observe(&mut self, bit: bool);
}

impl<M: BinaryModel + ?Sized> BinaryModel for &mut M {
    fn prob0(&mut self) -> f64 {
        (**self).prob0()
    }

    fn observe(&mut self, bit: bool) {
        (**self).observe(bit)
    }
}

/// A Context Tree Weighting model.
///
/// Owns a [`ContextTree`] and a sliding window of the last `D` bits, where `D` is the
/// length of the prior context the model was constructed with. Cloning a model deep
/// clones the tree (a flat buffer copy thanks to the arena layout), which is how
/// applications roll a model forward hypothetically without a [`CtwReverter`].
#[derive(Debug, Clone)]
pub struct Ctw {
    tree: ContextTree,
    /// Invariant: length equals the tree depth for the lifetime of the model.
    context: SmallVec<[bool; 64]>,
}

impl Ctw {
    /// Creates a model whose context tree depth is `prior_context.len()`.
    ///
    /// The prior context seeds the sliding window, i.e., it plays the role of the bits
    /// that preceded the sequence about to be observed.
    ///
    /// # Panics
    ///
    /// Panics if `prior_context` is empty.
    pub fn new(prior_context: &[bool]) -> Self {
        assert!(
            !prior_context.is_empty(),
            "context tree depth must be at least 1"
        );
        Self {
            tree: ContextTree::new(),
            context: SmallVec::from_slice(prior_context),
        }
    }

    /// The depth of the context tree.
    pub fn depth(&self) -> usize {
        self.context.len()
    }

    /// The CTW joint log-probability of the bits observed so far.
    pub fn root_log_prob(&self) -> f64 {
        self.tree.root_log_prob()
    }

    /// The probability that the next bit is zero.
    ///
    /// Computed in the single-speculation form `exp(L_after0 - L_before)`: the tree is
    /// speculatively updated with a zero observation and reverted before returning,
    /// exploiting that the conditional probability is the ratio of consecutive joint
    /// probabilities.
    pub fn prob0(&mut self) -> f64 {
        let before = self.tree.root_log_prob();
        let traversal = self.tree.update(&self.context, false);
        let after = self.tree.root_log_prob();
        self.tree.revert(traversal);
        (after - before).exp()
    }

    /// Irreversibly updates the tree and slides the context window.
    pub fn observe(&mut self, bit: bool) {
        self.observe_traced(bit);
    }

    /// Like [`observe`](Self::observe), but hands back what a later rollback needs:
    /// the traversal of the tree update and the context bit that fell out of the
    /// window.
    fn observe_traced(&mut self, bit: bool) -> (Traversal, bool) {
        let traversal = self.tree.update(&self.context, bit);
        let evicted = self.context.remove(0);
        self.context.push(bit);
        (traversal, evicted)
    }
}

impl BinaryModel for Ctw {
    fn prob0(&mut self) -> f64 {
        Ctw::prob0(self)
    }

    fn observe(&mut self, bit: bool) {
        Ctw::observe(self, bit)
    }
}

/// Multi-step speculation over a borrowed [`Ctw`].
///
/// Every [`observe`](Self::observe) records what it would take to undo itself;
/// [`unobserve`](Self::unobserve) pops those records in LIFO order. For any balanced
/// sequence of observe/unobserve calls, the model ends up in exactly the state it
/// started in: same tree log-probabilities, same context window, bit-identical
/// [`prob0`](Self::prob0).
///
/// The reverter borrows the model exclusively; observations made through the reverter
/// are real observations until they are unobserved, so a reverter dropped with pending
/// observations leaves them permanently applied.
#[derive(Debug)]
pub struct CtwReverter<'a> {
    model: &'a mut Ctw,
    /// One entry per pending observation: the tree traversal and the evicted context
    /// bit, pushed in observation order.
    pending: Vec<(Traversal, bool)>,
}

impl<'a> CtwReverter<'a> {
    /// Wraps `model` for speculative observation.
    pub fn new(model: &'a mut Ctw) -> Self {
        Self {
            model,
            pending: Vec::new(),
        }
    }

    /// The probability that the next bit is zero, as seen by the underlying model in
    /// its current (possibly speculated-forward) state.
    pub fn prob0(&mut self) -> f64 {
        self.model.prob0()
    }

    /// Observes `bit` and records how to take it back.
    pub fn observe(&mut self, bit: bool) {
        let record = self.model.observe_traced(bit);
        self.pending.push(record);
    }

    /// Takes back the most recent pending observation.
    ///
    /// # Panics
    ///
    /// Panics if every observation made through this reverter has already been
    /// unobserved.
    pub fn unobserve(&mut self) {
        let (traversal, evicted) = self
            .pending
            .pop()
            .expect("unobserve without a matching observe");
        self.model.tree.revert(traversal);
        self.model.context.pop();
        self.model.context.insert(0, evicted);
    }

    /// Number of observations that have not been unobserved yet.
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }
}

impl BinaryModel for CtwReverter<'_> {
    fn prob0(&mut self) -> f64 {
        CtwReverter::prob0(self)
    }

    fn observe(&mut self, bit: bool) {
        CtwReverter::observe(self, bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &[u8]) -> Vec<bool> {
        pattern.iter().map(|&b| b != 0).collect()
    }

    #[test]
    fn prob0_is_deterministic() {
        let mut model = Ctw::new(&[false; 8]);
        for &bit in &bits(&[1, 0, 0, 1, 1, 1, 0, 1, 0, 0, 0, 1]) {
            model.observe(bit);
        }
        let first = model.prob0();
        let second = model.prob0();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn prob0_and_prob1_sum_to_one() {
        let mut model = Ctw::new(&[true, false, true, false]);
        for &bit in &bits(&[0, 0, 1, 0, 1, 1, 1, 0, 0, 1]) {
            let p0 = model.prob0();

            // Hypothetical probability of a one, from the same joint-probability ratio.
            let mut speculation = model.clone();
            let before = speculation.root_log_prob();
            speculation.observe(true);
            let p1 = (speculation.root_log_prob() - before).exp();

            assert!(p0 > 0.0 && p0 < 1.0);
            assert!(p1 > 0.0 && p1 < 1.0);
            assert!((p0 + p1 - 1.0).abs() < 1e-9);

            model.observe(bit);
        }
    }

    #[test]
    fn clone_is_independent() {
        let mut model = Ctw::new(&[false; 16]);
        for &bit in &bits(&[1, 1, 0, 1, 0, 0, 1]) {
            model.observe(bit);
        }
        let reference = model.prob0();

        let mut copy = model.clone();
        for &bit in &bits(&[0, 0, 0, 1, 1]) {
            copy.observe(bit);
        }

        assert_eq!(model.prob0().to_bits(), reference.to_bits());
        assert_ne!(copy.prob0().to_bits(), reference.to_bits());
    }

    #[test]
    fn reverter_balanced_sequences_restore_state() {
        let mut model = Ctw::new(&[false; 48]);
        let x = bits(&[
            1, 1, 0, 1, 0, 0, 1, 1, 0, 1, 1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0,
        ]);
        for &bit in &x {
            model.observe(bit);
        }
        let prob0 = model.prob0();
        let log_prob = model.root_log_prob();

        let mut reverter = CtwReverter::new(&mut model);
        let y = bits(&[0, 1, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0]);
        for &bit in &y {
            reverter.observe(bit);
            reverter.unobserve();

            reverter.observe(bit);
            reverter.observe(bit);
            reverter.unobserve();
        }
        assert_eq!(reverter.num_pending(), y.len());
        let prob0_updated = reverter.prob0();
        assert_ne!(prob0_updated.to_bits(), prob0.to_bits());

        for _ in &y {
            reverter.unobserve();
        }
        assert_eq!(reverter.num_pending(), 0);

        assert_eq!(model.prob0().to_bits(), prob0.to_bits());
        assert_eq!(model.root_log_prob().to_bits(), log_prob.to_bits());
    }

    #[test]
    #[should_panic(expected = "unobserve without a matching observe")]
    fn unbalanced_unobserve_panics() {
        let mut model = Ctw::new(&[false; 4]);
        let mut reverter = CtwReverter::new(&mut model);
        reverter.observe(true);
        reverter.unobserve();
        reverter.unobserve();
    }
}
