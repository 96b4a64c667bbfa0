//! Snapshot replay: turning stored commitments back into solver
//! constraints under their guard literal.
//!
//! Every push tags the solver-level reason with the triggering guard,
//! so a later backjump past the guard unwinds the bound automatically.

use cadence_solver::{Lbool, Lit, Solver, TermId, TermKind};

use crate::adaptation::BoundSnapshot;

/// Inject one snapshot into the solver's theories. Returns `false` on
/// conflict, with the explanation already placed in the solver's
/// conflict buffer.
pub(crate) fn replay_snapshot(
    slv: &mut dyn Solver,
    term: TermId,
    snapshot: &BoundSnapshot,
    reason: Lit,
) -> bool {
    match snapshot {
        BoundSnapshot::Bool(val) => {
            let TermKind::Bool(lit) = slv.term_kind(term) else {
                debug_assert!(false, "bool snapshot on non-bool term");
                return true;
            };
            let expected = if *val == Lbool::True { lit } else { !lit };
            match slv.value(expected) {
                Lbool::Undef => {
                    slv.record(vec![expected, !reason]);
                    true
                }
                Lbool::True => true,
                Lbool::False => {
                    slv.post_conflict(vec![expected, !reason]);
                    false
                }
            }
        }
        BoundSnapshot::Arith { lb, ub } => {
            if slv.is_constant(term) {
                return true;
            }
            let Some(lin) = slv.term_lin(term) else {
                return true;
            };
            let var = slv.arith_var(&lin);
            slv.set_lb(var, *lb, reason) && slv.set_ub(var, *ub, reason)
        }
        BoundSnapshot::Enum(val) => {
            let domain = slv.enum_value(term);
            if domain.len() > 1 {
                let allows = slv.allows(term, *val);
                slv.record(vec![allows, !reason]);
                true
            } else if domain.first() == Some(val) {
                true
            } else {
                let allows = slv.allows(term, *val);
                slv.post_conflict(vec![allows, !reason]);
                false
            }
        }
    }
}
