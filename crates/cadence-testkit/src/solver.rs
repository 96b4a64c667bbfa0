//! A scripted in-memory solver.
//!
//! `ScriptedSolver` implements the full solver contract with just
//! enough search to exercise the executor: solving assigns every
//! undecided variable, clamps numeric values into their bounds, and
//! collapses enum domains; conflict analysis jumps to root level and
//! forces the conflict literals true. Tests build plans directly
//! through the atom constructors and script unsat rounds or bound
//! rejections where a scenario needs them.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use cadence_solver::{
    ArithVar, AtomId, CoreListenerRef, EnumVal, Flaw, InfRational, Lbool, LinExpr, Lit, PredId,
    Rational, Solver, SolverError, SolverListenerRef, TermId, TermKind, TheoryId, TheoryRef,
    TypeId, Var, AT, DURATION, END, START,
};

#[derive(Debug)]
enum TermDomain {
    Bool(Lit),
    Arith(LinExpr),
    Enum {
        domain: Vec<EnumVal>,
        allow_lits: HashMap<EnumVal, Lit>,
    },
}

#[derive(Debug)]
struct TermRec {
    domain: TermDomain,
}

#[derive(Debug)]
struct AtomRec {
    sigma: Lit,
    pred: PredId,
    params: Vec<(String, TermId)>,
}

#[derive(Debug, Default)]
struct PredRec {
    impulse: bool,
    interval: bool,
    instances: Vec<AtomId>,
}

#[derive(Debug, Default)]
struct TypeRec {
    subtypes: Vec<TypeId>,
    predicates: Vec<PredId>,
}

#[derive(Debug, Clone, Copy)]
struct ArithState {
    lb: InfRational,
    ub: InfRational,
    value: InfRational,
}

impl ArithState {
    fn free(value: InfRational) -> Self {
        ArithState {
            lb: InfRational::negative_infinity(),
            ub: InfRational::positive_infinity(),
            value,
        }
    }
}

/// In-memory solver with scripted outcomes.
#[derive(Default)]
pub struct ScriptedSolver {
    // SAT core
    values: Vec<Lbool>,
    trail: Vec<Vec<Var>>,
    clauses: Vec<Vec<Lit>>,
    recorded: Vec<Vec<Lit>>,
    conflict: Vec<Lit>,
    queue: VecDeque<Lit>,
    forced: HashMap<Var, bool>,
    // registration
    theories: Vec<TheoryRef>,
    watches: HashMap<Var, Vec<TheoryId>>,
    core_listeners: Vec<CoreListenerRef>,
    solver_listeners: Vec<SolverListenerRef>,
    // arithmetic theory
    arith: Vec<ArithState>,
    lin_cache: HashMap<String, ArithVar>,
    // model
    terms: HashMap<TermId, TermRec>,
    atoms: HashMap<AtomId, AtomRec>,
    preds: HashMap<PredId, PredRec>,
    top_preds: Vec<PredId>,
    types: HashMap<TypeId, TypeRec>,
    top_types: Vec<TypeId>,
    horizon: Option<TermId>,
    next_term: u64,
    next_atom: u64,
    next_pred: u32,
    next_type: u32,
    // scripting
    outcomes: VecDeque<bool>,
    reject_next_lb: bool,
    fail_backjump: bool,
    next_read_fails: bool,
    scripts: Vec<String>,
}

impl ScriptedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    // --- plan building ---

    pub fn interval_predicate(&mut self) -> PredId {
        self.fresh_pred(false, true, true)
    }

    pub fn impulse_predicate(&mut self) -> PredId {
        self.fresh_pred(true, false, true)
    }

    /// An interval predicate reachable only through the type hierarchy
    /// (a subtype of a fresh top-level type).
    pub fn nested_interval_predicate(&mut self) -> PredId {
        let pred = self.fresh_pred(false, true, false);
        let inner = self.fresh_type(vec![], vec![pred]);
        self.fresh_type(vec![inner], vec![]);
        pred
    }

    pub fn new_interval_atom(&mut self, pred: PredId, start: i64, end: i64) -> AtomId {
        let sigma = Lit::positive(self.fresh_var());
        let start_t = self.new_arith_term(start);
        let end_t = self.new_arith_term(end);
        let duration_t = self.new_const_term(end - start);
        self.new_atom(
            pred,
            sigma,
            vec![
                (START.to_string(), start_t),
                (END.to_string(), end_t),
                (DURATION.to_string(), duration_t),
            ],
        )
    }

    pub fn new_impulse_atom(&mut self, pred: PredId, at: i64) -> AtomId {
        let sigma = Lit::positive(self.fresh_var());
        let at_t = self.new_arith_term(at);
        self.new_atom(pred, sigma, vec![(AT.to_string(), at_t)])
    }

    pub fn add_bool_param(&mut self, atom: AtomId, name: &str) -> Lit {
        let lit = Lit::positive(self.fresh_var());
        let term = self.fresh_term(TermDomain::Bool(lit));
        self.push_param(atom, name, term);
        lit
    }

    pub fn add_arith_param(&mut self, atom: AtomId, name: &str, value: i64) -> TermId {
        let term = self.new_arith_term(value);
        self.push_param(atom, name, term);
        term
    }

    pub fn add_const_param(&mut self, atom: AtomId, name: &str, value: i64) -> TermId {
        let term = self.new_const_term(value);
        self.push_param(atom, name, term);
        term
    }

    pub fn add_enum_param(&mut self, atom: AtomId, name: &str, domain: Vec<u64>) -> TermId {
        let term = self.fresh_term(TermDomain::Enum {
            domain: domain.into_iter().map(EnumVal).collect(),
            allow_lits: HashMap::new(),
        });
        self.push_param(atom, name, term);
        term
    }

    /// Replace an interval atom's start coordinate with a constant
    /// expression; used to exercise the cannot-delay-constants path.
    pub fn make_start_constant(&mut self, atom: AtomId, value: i64) {
        let term = self.new_const_term(value);
        if let Some(rec) = self.atoms.get_mut(&atom) {
            if let Some(slot) = rec.params.iter_mut().find(|(n, _)| n == START) {
                slot.1 = term;
            }
        }
    }

    pub fn set_horizon(&mut self, at: i64) {
        let term = self.new_const_term(at);
        self.horizon = Some(term);
    }

    // --- scripting knobs ---

    /// Make the next `solve` round report an inconsistent problem.
    pub fn script_unsat(&mut self) {
        self.outcomes.push_back(false);
    }

    /// Make the next lower-bound push fail with a theory conflict.
    pub fn reject_next_lower_bound(&mut self) {
        self.reject_next_lb = true;
    }

    /// Make conflict analysis unresolvable.
    pub fn fail_next_backjump(&mut self) {
        self.fail_backjump = true;
    }

    /// Make the next `read_script` fail to parse.
    pub fn fail_next_read(&mut self) {
        self.next_read_fails = true;
    }

    // --- inspection ---

    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    pub fn recorded(&self) -> &[Vec<Lit>] {
        &self.recorded
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub fn sigma_value(&self, atom: AtomId) -> Lbool {
        self.atoms
            .get(&atom)
            .map(|rec| self.value(rec.sigma))
            .unwrap_or(Lbool::Undef)
    }

    /// The `(lb, ub, value)` triple of an arithmetic term; `None` for
    /// non-arithmetic or unknown terms.
    pub fn arith_state(&self, term: TermId) -> Option<(InfRational, InfRational, InfRational)> {
        match &self.terms.get(&term)?.domain {
            TermDomain::Arith(lin) => match lin.as_single_var() {
                Some(v) => {
                    let st = self.arith.get(v.0 as usize)?;
                    Some((st.lb, st.ub, st.value))
                }
                None => {
                    let val = self.eval_lin(lin);
                    Some((val, val, val))
                }
            },
            _ => None,
        }
    }

    // --- internals ---

    fn fresh_var(&mut self) -> Var {
        let var = Var(self.values.len() as u32);
        self.values.push(Lbool::Undef);
        var
    }

    fn fresh_term(&mut self, domain: TermDomain) -> TermId {
        let term = TermId(self.next_term);
        self.next_term += 1;
        self.terms.insert(term, TermRec { domain });
        term
    }

    fn fresh_arith(&mut self, value: InfRational) -> ArithVar {
        let var = ArithVar(self.arith.len() as u32);
        self.arith.push(ArithState::free(value));
        var
    }

    /// Predicate and type creation reshapes the problem, so both are
    /// announced to core listeners the way a real `read` would be.
    fn notify_read(&mut self) {
        for l in self.core_listeners.clone() {
            if let Ok(mut listener) = l.lock() {
                listener.read(self);
            }
        }
    }

    fn fresh_pred(&mut self, impulse: bool, interval: bool, top_level: bool) -> PredId {
        let pred = PredId(self.next_pred);
        self.next_pred += 1;
        self.preds.insert(
            pred,
            PredRec {
                impulse,
                interval,
                instances: Vec::new(),
            },
        );
        if top_level {
            self.top_preds.push(pred);
        }
        self.notify_read();
        pred
    }

    fn fresh_type(&mut self, subtypes: Vec<TypeId>, predicates: Vec<PredId>) -> TypeId {
        let tp = TypeId(self.next_type);
        self.next_type += 1;
        for sub in &subtypes {
            self.top_types.retain(|t| t != sub);
        }
        self.types.insert(
            tp,
            TypeRec {
                subtypes,
                predicates,
            },
        );
        self.top_types.push(tp);
        self.notify_read();
        tp
    }

    fn new_arith_term(&mut self, value: i64) -> TermId {
        let var = self.fresh_arith(InfRational::from(value));
        self.fresh_term(TermDomain::Arith(LinExpr::variable(var)))
    }

    fn new_const_term(&mut self, value: i64) -> TermId {
        self.fresh_term(TermDomain::Arith(LinExpr::constant(Rational::from(value))))
    }

    fn new_atom(&mut self, pred: PredId, sigma: Lit, params: Vec<(String, TermId)>) -> AtomId {
        let atom = AtomId(self.next_atom);
        self.next_atom += 1;
        self.atoms.insert(
            atom,
            AtomRec {
                sigma,
                pred,
                params,
            },
        );
        if let Some(rec) = self.preds.get_mut(&pred) {
            rec.instances.push(atom);
        }
        let flaw = Flaw::Atom(atom);
        for l in self.solver_listeners.clone() {
            if let Ok(mut listener) = l.lock() {
                listener.flaw_created(self, &flaw);
            }
        }
        atom
    }

    fn push_param(&mut self, atom: AtomId, name: &str, term: TermId) {
        if let Some(rec) = self.atoms.get_mut(&atom) {
            rec.params.push((name.to_string(), term));
        }
    }

    fn assign(&mut self, var: Var, positive: bool) {
        self.values[var.0 as usize] = Lbool::from(positive);
        if let Some(frame) = self.trail.last_mut() {
            frame.push(var);
        }
        if self.watches.contains_key(&var) {
            self.queue.push_back(Lit::new(var, positive));
        }
    }

    fn eval_lin(&self, lin: &LinExpr) -> InfRational {
        let mut total = InfRational::from(lin.known);
        for (var, coeff) in &lin.vars {
            total = total + self.arith[var.0 as usize].value * *coeff;
        }
        total
    }
}

impl Solver for ScriptedSolver {
    fn new_var(&mut self) -> Var {
        self.fresh_var()
    }

    fn new_clause(&mut self, clause: Vec<Lit>) -> bool {
        self.clauses.push(clause);
        true
    }

    fn value(&self, p: Lit) -> Lbool {
        self.values[p.var().0 as usize].through(p.is_positive())
    }

    fn propagate(&mut self) -> bool {
        while let Some(p) = self.queue.pop_front() {
            let Some(theory_ids) = self.watches.get(&p.var()).cloned() else {
                continue;
            };
            for tid in theory_ids {
                let Some(theory) = self.theories.get(tid.0 as usize).cloned() else {
                    continue;
                };
                let ok = match theory.lock() {
                    Ok(mut th) => th.propagate(self, p),
                    Err(_) => true,
                };
                if !ok {
                    return false;
                }
            }
        }
        true
    }

    fn pop(&mut self) {
        if let Some(frame) = self.trail.pop() {
            for var in frame {
                self.values[var.0 as usize] = Lbool::Undef;
            }
            for theory in self.theories.clone() {
                if let Ok(mut th) = theory.lock() {
                    th.pop();
                }
            }
        }
    }

    fn root_level(&self) -> bool {
        self.trail.is_empty()
    }

    fn take_decision(&mut self, p: Lit) -> bool {
        self.trail.push(Vec::new());
        for theory in self.theories.clone() {
            if let Ok(mut th) = theory.lock() {
                th.push();
            }
        }
        self.assign(p.var(), p.is_positive());
        self.propagate()
    }

    fn bind(&mut self, v: Var, th: TheoryId) {
        let watchers = self.watches.entry(v).or_default();
        if !watchers.contains(&th) {
            watchers.push(th);
        }
    }

    fn record(&mut self, clause: Vec<Lit>) {
        let mut satisfied = false;
        let mut undef = None;
        let mut undef_count = 0;
        for l in &clause {
            match self.value(*l) {
                Lbool::True => satisfied = true,
                Lbool::Undef => {
                    undef_count += 1;
                    undef = Some(*l);
                }
                Lbool::False => {}
            }
        }
        if !satisfied && undef_count == 1 {
            if let Some(l) = undef {
                self.assign(l.var(), l.is_positive());
            }
        }
        self.recorded.push(clause);
    }

    fn post_conflict(&mut self, conflict: Vec<Lit>) {
        self.conflict = conflict;
    }

    fn analyze_and_backjump(&mut self) -> bool {
        if self.fail_backjump {
            self.conflict.clear();
            return false;
        }
        while !self.root_level() {
            self.pop();
        }
        let conflict = std::mem::take(&mut self.conflict);
        for l in conflict {
            self.forced.insert(l.var(), l.is_positive());
            self.assign(l.var(), l.is_positive());
        }
        true
    }

    fn add_theory(&mut self, th: TheoryRef) -> TheoryId {
        let id = TheoryId(self.theories.len() as u32);
        self.theories.push(th);
        id
    }

    fn add_core_listener(&mut self, l: CoreListenerRef) {
        self.core_listeners.push(l);
    }

    fn add_solver_listener(&mut self, l: SolverListenerRef) {
        self.solver_listeners.push(l);
    }

    fn arith_var(&mut self, lin: &LinExpr) -> ArithVar {
        if let Some(var) = lin.as_single_var() {
            return var;
        }
        let key = format!("{lin}");
        if let Some(var) = self.lin_cache.get(&key) {
            return *var;
        }
        let value = self.eval_lin(lin);
        let var = self.fresh_arith(value);
        self.lin_cache.insert(key, var);
        var
    }

    fn set_lb(&mut self, v: ArithVar, lb: InfRational, reason: Lit) -> bool {
        if self.reject_next_lb {
            self.reject_next_lb = false;
            self.conflict = vec![!reason];
            return false;
        }
        let st = &mut self.arith[v.0 as usize];
        if lb > st.ub {
            self.conflict = vec![!reason];
            return false;
        }
        if lb > st.lb {
            st.lb = lb;
        }
        true
    }

    fn set_ub(&mut self, v: ArithVar, ub: InfRational, reason: Lit) -> bool {
        let st = &mut self.arith[v.0 as usize];
        if ub < st.lb {
            self.conflict = vec![!reason];
            return false;
        }
        if ub < st.ub {
            st.ub = ub;
        }
        true
    }

    fn set_eq(&mut self, v: ArithVar, val: InfRational, reason: Lit) -> bool {
        let st = &mut self.arith[v.0 as usize];
        if val < st.lb || val > st.ub {
            self.conflict = vec![!reason];
            return false;
        }
        st.lb = val;
        st.ub = val;
        st.value = val;
        true
    }

    fn enum_value(&self, t: TermId) -> Vec<EnumVal> {
        match &self.terms[&t].domain {
            TermDomain::Enum { domain, .. } => domain.clone(),
            _ => Vec::new(),
        }
    }

    fn allows(&mut self, t: TermId, val: EnumVal) -> Lit {
        if let Some(TermDomain::Enum { allow_lits, .. }) = self.terms.get(&t).map(|r| &r.domain) {
            if let Some(l) = allow_lits.get(&val) {
                return *l;
            }
        }
        let lit = Lit::positive(self.fresh_var());
        if let Some(rec) = self.terms.get_mut(&t) {
            if let TermDomain::Enum { allow_lits, .. } = &mut rec.domain {
                allow_lits.insert(val, lit);
            }
        }
        lit
    }

    fn read_script(&mut self, script: &str) -> Result<(), SolverError> {
        if self.next_read_fails {
            self.next_read_fails = false;
            return Err(SolverError::Parse("scripted parse failure".to_string()));
        }
        self.scripts.push(script.to_string());
        self.notify_read();
        Ok(())
    }

    fn read_files(&mut self, files: &[PathBuf]) -> Result<(), SolverError> {
        for f in files {
            self.scripts.push(f.display().to_string());
        }
        self.notify_read();
        Ok(())
    }

    fn solve(&mut self) -> bool {
        for l in self.core_listeners.clone() {
            if let Ok(mut listener) = l.lock() {
                listener.started_solving(self);
            }
        }
        let sat = self.outcomes.pop_front().unwrap_or(true);
        if !sat {
            for l in self.core_listeners.clone() {
                if let Ok(mut listener) = l.lock() {
                    listener.inconsistent_problem(self);
                }
            }
            return false;
        }
        for i in 0..self.values.len() {
            if self.values[i] == Lbool::Undef {
                let var = Var(i as u32);
                let positive = self.forced.get(&var).copied().unwrap_or(true);
                self.assign(var, positive);
            }
        }
        for st in &mut self.arith {
            if st.value < st.lb {
                st.value = st.lb;
            }
            if st.value > st.ub {
                st.value = st.ub;
            }
        }
        for rec in self.terms.values_mut() {
            if let TermDomain::Enum { domain, .. } = &mut rec.domain {
                if domain.len() > 1 {
                    domain.truncate(1);
                }
            }
        }
        if !self.propagate() {
            let _ = self.analyze_and_backjump();
            let _ = self.propagate();
        }
        for l in self.core_listeners.clone() {
            if let Ok(mut listener) = l.lock() {
                listener.solution_found(self);
            }
        }
        true
    }

    fn arith_value(&self, t: TermId) -> InfRational {
        match &self.terms[&t].domain {
            TermDomain::Arith(lin) => self.eval_lin(lin),
            _ => InfRational::ZERO,
        }
    }

    fn arith_bounds(&self, t: TermId) -> (InfRational, InfRational) {
        match &self.terms[&t].domain {
            TermDomain::Arith(lin) => {
                if lin.is_constant() {
                    let val = InfRational::from(lin.known);
                    (val, val)
                } else if let Some(var) = lin.as_single_var() {
                    let st = self.arith[var.0 as usize];
                    (st.lb, st.ub)
                } else {
                    (
                        InfRational::negative_infinity(),
                        InfRational::positive_infinity(),
                    )
                }
            }
            _ => (
                InfRational::negative_infinity(),
                InfRational::positive_infinity(),
            ),
        }
    }

    fn horizon(&self) -> Option<TermId> {
        self.horizon
    }

    fn predicates(&self) -> Vec<PredId> {
        self.top_preds.clone()
    }

    fn types(&self) -> Vec<TypeId> {
        self.top_types.clone()
    }

    fn subtypes(&self, t: TypeId) -> Vec<TypeId> {
        self.types.get(&t).map(|r| r.subtypes.clone()).unwrap_or_default()
    }

    fn type_predicates(&self, t: TypeId) -> Vec<PredId> {
        self.types
            .get(&t)
            .map(|r| r.predicates.clone())
            .unwrap_or_default()
    }

    fn instances(&self, p: PredId) -> Vec<AtomId> {
        self.preds.get(&p).map(|r| r.instances.clone()).unwrap_or_default()
    }

    fn is_impulse(&self, p: PredId) -> bool {
        self.preds.get(&p).map(|r| r.impulse).unwrap_or(false)
    }

    fn is_interval(&self, p: PredId) -> bool {
        self.preds.get(&p).map(|r| r.interval).unwrap_or(false)
    }

    fn is_impulse_atom(&self, a: AtomId) -> bool {
        self.atoms
            .get(&a)
            .map(|r| self.is_impulse(r.pred))
            .unwrap_or(false)
    }

    fn is_interval_atom(&self, a: AtomId) -> bool {
        self.atoms
            .get(&a)
            .map(|r| self.is_interval(r.pred))
            .unwrap_or(false)
    }

    fn atom_sigma(&self, a: AtomId) -> Lit {
        self.atoms[&a].sigma
    }

    fn atom_param(&self, a: AtomId, name: &str) -> Option<TermId> {
        self.atoms
            .get(&a)?
            .params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    fn atom_params(&self, a: AtomId) -> Vec<(String, TermId)> {
        self.atoms.get(&a).map(|r| r.params.clone()).unwrap_or_default()
    }

    fn term_kind(&self, t: TermId) -> TermKind {
        match &self.terms[&t].domain {
            TermDomain::Bool(lit) => TermKind::Bool(*lit),
            TermDomain::Arith(_) => TermKind::Arith,
            TermDomain::Enum { .. } => TermKind::Enum,
        }
    }

    fn term_lin(&self, t: TermId) -> Option<LinExpr> {
        match &self.terms[&t].domain {
            TermDomain::Arith(lin) => Some(lin.clone()),
            _ => None,
        }
    }

    fn is_constant(&self, t: TermId) -> bool {
        match &self.terms[&t].domain {
            TermDomain::Arith(lin) => lin.is_constant(),
            _ => false,
        }
    }
}
