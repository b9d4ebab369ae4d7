//! Generic convex backend.
//!
//! `ConvexSolver` compiles the loss, penalty and constraint of a problem into
//! one conic program over the coefficient, the intercept and auxiliary
//! variables. The penalty strength and weights enter only through the linear
//! cost of dedicated auxiliary variables, so moving along a path rewrites a few
//! cost entries and never rebuilds variables or constraint rows.

use std::ops::Range;
use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use super::program::{AffineRow, ConicProgram, ConicSolution, StuffedProblem};
use super::{
    AuxState, GlmProblem, GlmSolver, SolveInfo, SolveResult, SolverOutput, SolverSettings,
    WarmStart,
};
use crate::config::{
    check_weight_values, effective_weight, ConstraintConfig, LossKind, LossSpec, PenaltyConfig,
    PenaltyKind, PenaltyUpdate,
};
use crate::error::{GlmError, Result};
use crate::linalg::clip_zero;
use crate::pen_max::bounds::check_groups;
use crate::pen_max::grad_zero::check_xy;
use crate::prox::constraint_func;

/// Whether the external conic solver is compiled in.
const HAS_BACKEND: bool = cfg!(feature = "clarabel");
/// Whether the solver was built with semidefinite cones.
const HAS_SDP: bool = cfg!(feature = "sdp");

/// Convex backend solving the whole problem as one conic program.
#[derive(Debug, Clone, Default)]
pub struct ConvexSolver {
    pub settings: SolverSettings,
    state: Option<SolverState>,
}

/// Position of the model variables inside the program.
#[derive(Debug, Clone)]
struct Layout {
    n_features: usize,
    n_responses: usize,
    coef: Range<usize>,
    intercept: Option<Range<usize>>,
}

impl Layout {
    fn coef_var(&self, j: usize, c: usize) -> usize {
        self.coef.start + c * self.n_features + j
    }

    fn unpack_coef(&self, x: &[f64]) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.n_features, self.n_responses, &x[self.coef.clone()])
    }

    fn unpack_intercept(&self, x: &[f64]) -> Option<DVector<f64>> {
        self.intercept
            .clone()
            .map(|range| DVector::from_column_slice(&x[range]))
    }
}

/// A penalty parameter inside the linear cost: `q[var] = pen_val * weight`.
#[derive(Debug, Clone)]
struct PenaltySlot {
    var: usize,
    weight_idx: usize,
    /// Weight used when the penalty carries no explicit weights.
    default_weight: f64,
}

#[derive(Debug, Clone)]
struct SolverState {
    layout: Layout,
    problem: StuffedProblem,
    /// Linear cost of the loss alone.
    loss_q: Vec<f64>,
    slots: Vec<PenaltySlot>,
    penalty: PenaltyConfig,
    coef: DMatrix<f64>,
    intercept: Option<DVector<f64>>,
    aux: Option<AuxState>,
}

impl SolverState {
    fn linear_cost(&self) -> Vec<f64> {
        let mut q = self.loss_q.clone();
        for slot in &self.slots {
            let w = self
                .penalty
                .weights
                .as_ref()
                .map_or(slot.default_weight, |w| effective_weight(w[slot.weight_idx]));
            q[slot.var] = self.penalty.pen_val * w;
        }
        q
    }

    fn apply_warm_start(&mut self, init: &WarmStart) -> Result<()> {
        let shape = (self.layout.n_features, self.layout.n_responses);
        if let Some(coef) = &init.coef {
            if coef.shape() != shape {
                return Err(GlmError::shape(
                    format!("coef_init of shape {:?}", shape),
                    format!("{:?}", coef.shape()),
                ));
            }
            self.coef = coef.clone();
        }
        if let Some(intercept) = &init.intercept {
            if self.layout.intercept.is_none() {
                return Err(GlmError::InvalidProblem(
                    "intercept_init given but the intercept is not fit".into(),
                ));
            }
            if intercept.len() != self.layout.n_responses {
                return Err(GlmError::shape(
                    format!("intercept_init of length {}", self.layout.n_responses),
                    format!("{}", intercept.len()),
                ));
            }
            self.intercept = Some(intercept.clone());
        }
        if let Some(aux) = &init.other {
            if aux.primal.len() == self.problem.q.len() {
                self.aux = Some(aux.clone());
            } else {
                log::debug!("ignoring auxiliary state from a different program");
            }
        }
        Ok(())
    }
}

impl ConvexSolver {
    pub fn new(settings: SolverSettings) -> Self {
        ConvexSolver {
            settings,
            state: None,
        }
    }

    /// Whether `setup` has been called.
    pub fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    /// The current penalty configuration, after any updates.
    pub fn penalty(&self) -> Option<&PenaltyConfig> {
        self.state.as_ref().map(|s| &s.penalty)
    }

    /// Last coefficient values: the latest solution or warm start.
    pub fn current_coef(&self) -> Option<&DMatrix<f64>> {
        self.state.as_ref().map(|s| &s.coef)
    }

    /// Last intercept values.
    pub fn current_intercept(&self) -> Option<&DVector<f64>> {
        self.state.as_ref().and_then(|s| s.intercept.as_ref())
    }

    /// Primal and dual vectors of the last solve, or the state handed in as a
    /// warm start.
    pub fn aux_state(&self) -> Option<&AuxState> {
        self.state.as_ref().and_then(|s| s.aux.as_ref())
    }

    /// Size of the compiled program as (variables, constraint rows).
    pub fn program_size(&self) -> Option<(usize, usize)> {
        self.state
            .as_ref()
            .map(|s| (s.problem.q.len(), s.problem.b.len()))
    }
}

fn supports_penalty(penalty: &PenaltyConfig) -> bool {
    match penalty.kind {
        PenaltyKind::None
        | PenaltyKind::Lasso
        | PenaltyKind::GroupLasso { .. }
        | PenaltyKind::MultiTask => true,
        PenaltyKind::Nuclear => HAS_SDP && uniform_weights(penalty.weights.as_ref()),
    }
}

/// Whether every entry carries the same effective weight.
fn uniform_weights(weights: Option<&DMatrix<f64>>) -> bool {
    let Some(w) = weights else {
        return true;
    };
    let mut values = w.iter().map(|&v| effective_weight(v));
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

impl GlmSolver for ConvexSolver {
    fn name(&self) -> &'static str {
        "convex"
    }

    fn is_applicable(
        &self,
        _loss: &LossSpec,
        penalty: &PenaltyConfig,
        _constraint: &ConstraintConfig,
    ) -> bool {
        if !HAS_BACKEND {
            log::warn!("clarabel is not compiled in, so the convex solver cannot be used");
            return false;
        }
        penalty.flavor.is_convex() && supports_penalty(penalty)
    }

    fn setup(
        &mut self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        sample_weight: Option<&DVector<f64>>,
        problem: &GlmProblem,
    ) -> Result<()> {
        if !self.is_applicable(&problem.loss, &problem.penalty, &problem.constraint) {
            return Err(GlmError::NotApplicable(format!(
                "convex solver cannot handle a {:?} {} penalty",
                problem.penalty.flavor,
                problem.penalty.kind.name()
            )));
        }
        check_xy(x, y)?;
        problem.loss.validate()?;
        if problem.loss.kind == LossKind::Multinomial && y.ncols() < 2 {
            return Err(GlmError::shape(
                "an indicator matrix with at least 2 classes",
                format!("{} columns", y.ncols()),
            ));
        }
        // validates constraint parameters
        constraint_func(&problem.constraint)?;

        let n_samples = x.nrows();
        let sample_weight = match sample_weight {
            Some(w) => {
                if w.len() != n_samples {
                    return Err(GlmError::shape(
                        format!("sample_weight of length {}", n_samples),
                        format!("{}", w.len()),
                    ));
                }
                if w.iter().any(|&v| !(v >= 0.0 && v.is_finite())) {
                    return Err(GlmError::InvalidConfig(
                        "sample weights must be finite and nonnegative".into(),
                    ));
                }
                w.clone()
            }
            None => DVector::from_element(n_samples, 1.0),
        };

        let mut program = ConicProgram::new();
        let coef = program.add_vars(x.ncols() * y.ncols());
        let intercept = problem
            .fit_intercept
            .then(|| program.add_vars(y.ncols()));
        let layout = Layout {
            n_features: x.ncols(),
            n_responses: y.ncols(),
            coef,
            intercept,
        };
        validate_penalty(&problem.penalty, &layout)?;

        add_loss(&mut program, &layout, x, y, &sample_weight, problem.loss.kind);
        let mut loss_q = program.linear().to_vec();
        let slots = add_penalty(&mut program, &layout, &problem.penalty.kind)?;
        add_constraint(&mut program, &layout, &problem.constraint)?;
        // penalty and constraint auxiliaries carry no loss cost
        loss_q.resize(program.n_vars(), 0.0);

        let stuffed = program.stuff();
        log::debug!(
            "convex solver: {} loss, {} penalty, {} constraint -> {} variables, {} rows",
            problem.loss,
            problem.penalty.kind.name(),
            problem.constraint.name(),
            program.n_vars(),
            program.n_rows()
        );

        self.state = Some(SolverState {
            coef: DMatrix::zeros(layout.n_features, layout.n_responses),
            intercept: layout
                .intercept
                .as_ref()
                .map(|_| DVector::zeros(layout.n_responses)),
            layout,
            problem: stuffed,
            loss_q,
            slots,
            penalty: problem.penalty.clone(),
            aux: None,
        });
        Ok(())
    }

    fn update_penalty(&mut self, update: &PenaltyUpdate) -> Result<()> {
        let state = self.state.as_mut().ok_or_else(|| {
            GlmError::InvalidProblem("update_penalty called before setup".into())
        })?;
        let mut penalty = state.penalty.clone();
        penalty.set_params(update)?;
        validate_penalty(&penalty, &state.layout)?;
        state.penalty = penalty;
        Ok(())
    }

    /// Solve the current program.
    ///
    /// Clarabel's interior-point iterations start from their own initial point;
    /// the initial values are shape-checked and become the state's current
    /// iterate, and the reuse across path points comes from the compiled program.
    fn solve(&mut self, init: &WarmStart) -> Result<SolveResult> {
        let zero_tol = self.settings.zero_tol;
        let settings = &self.settings;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| GlmError::InvalidProblem("solve called before setup".into()))?;
        state.apply_warm_start(init)?;

        let q = state.linear_cost();
        let start = Instant::now();
        let solution = run_backend(&state.problem, &q, settings)?;
        let runtime = start.elapsed().as_secs_f64();

        if !solution.status.has_iterate() {
            log::warn!(
                "convex solver finished with status {} after {} iterations",
                solution.status,
                solution.iterations
            );
            return Err(GlmError::SolverFailed {
                status: solution.status.to_string(),
            });
        }
        if !solution.status.is_solved() {
            log::warn!(
                "convex solver stopped with status {} after {} iterations; returning the last iterate",
                solution.status,
                solution.iterations
            );
        }

        let mut coef = state.layout.unpack_coef(&solution.x);
        clip_zero(&mut coef, zero_tol);
        let intercept = state.layout.unpack_intercept(&solution.x);
        let objective = state.problem.objective(&q, &solution.x);

        state.coef = coef.clone();
        state.intercept = intercept.clone();
        let aux = AuxState {
            primal: solution.x,
            duals: solution.z,
        };
        state.aux = Some(aux.clone());

        log::info!(
            "convex solver: status {} in {:.3}s ({} iterations), pen_val {}",
            solution.status,
            runtime,
            solution.iterations,
            state.penalty.pen_val
        );

        let info = SolveInfo {
            status: solution.status,
            runtime,
            solver_time: solution.solve_time,
            iterations: solution.iterations,
            objective: Some(objective),
        };
        Ok((SolverOutput { coef, intercept }, Some(aux), info))
    }
}

#[cfg(feature = "clarabel")]
fn run_backend(
    problem: &StuffedProblem,
    q: &[f64],
    settings: &SolverSettings,
) -> Result<ConicSolution> {
    super::clarabel::solve(problem, q, settings)
}

#[cfg(not(feature = "clarabel"))]
fn run_backend(
    _problem: &StuffedProblem,
    _q: &[f64],
    _settings: &SolverSettings,
) -> Result<ConicSolution> {
    Err(GlmError::MissingDependency("clarabel".into()))
}

/// Check penalty strength and weight shapes against the layout.
fn validate_penalty(penalty: &PenaltyConfig, layout: &Layout) -> Result<()> {
    if !(penalty.pen_val >= 0.0 && penalty.pen_val.is_finite()) {
        return Err(GlmError::InvalidConfig(format!(
            "penalty value must be finite and nonnegative, got {}",
            penalty.pen_val
        )));
    }
    let Some(weights) = &penalty.weights else {
        return Ok(());
    };
    let expected = match &penalty.kind {
        PenaltyKind::None => return Ok(()),
        PenaltyKind::Lasso => layout.n_features * layout.n_responses,
        PenaltyKind::GroupLasso { groups } => groups.len(),
        PenaltyKind::MultiTask => layout.n_features,
        PenaltyKind::Nuclear => layout.n_features.min(layout.n_responses),
    };
    if weights.len() != expected {
        return Err(GlmError::shape(
            format!("{} {} weights", expected, penalty.kind.name()),
            format!("{}", weights.len()),
        ));
    }
    check_weight_values(weights)?;
    if penalty.kind == PenaltyKind::Nuclear && !uniform_weights(Some(weights)) {
        return Err(GlmError::InvalidConfig(
            "the convex solver only supports a uniformly weighted nuclear norm".into(),
        ));
    }
    Ok(())
}

/// Terms of the linear predictor `z_ic = x_i' coef_c + intercept_c`.
fn predictor(layout: &Layout, x: &DMatrix<f64>, i: usize, c: usize) -> Vec<(usize, f64)> {
    let mut terms: Vec<(usize, f64)> = (0..layout.n_features)
        .filter(|&j| x[(i, j)] != 0.0)
        .map(|j| (layout.coef_var(j, c), x[(i, j)]))
        .collect();
    if let Some(intercept) = &layout.intercept {
        terms.push((intercept.start + c, 1.0));
    }
    terms
}

/// Add `coef * z_ic` to the linear cost.
fn add_predictor_cost(program: &mut ConicProgram, terms: &[(usize, f64)], coef: f64) {
    if coef != 0.0 {
        for &(var, a) in terms {
            program.add_linear(var, coef * a);
        }
    }
}

fn add_loss(
    program: &mut ConicProgram,
    layout: &Layout,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    sample_weight: &DVector<f64>,
    kind: LossKind,
) {
    let n = x.nrows();
    let k = y.ncols();
    let scale = |i: usize| sample_weight[i] / n as f64;

    match kind {
        LossKind::LinReg => {
            // r = y - z, cost (s_i / 2n) r^2
            let r = program.add_vars(n * k);
            let mut rows = Vec::with_capacity(n * k);
            for c in 0..k {
                for i in 0..n {
                    let var = r.start + c * n + i;
                    rows.push(
                        AffineRow::var(var)
                            .plus_terms(predictor(layout, x, i, c))
                            .offset(-y[(i, c)]),
                    );
                    program.add_square(var, scale(i));
                }
            }
            program.push_zero(rows);
        }
        LossKind::Huber { knot } => {
            // y - z = w + u - v with u, v >= 0, cost w^2 / 2 + knot (u + v)
            let w = program.add_vars(n * k);
            let u = program.add_vars(n * k);
            let v = program.add_vars(n * k);
            let mut rows = Vec::with_capacity(n * k);
            for c in 0..k {
                for i in 0..n {
                    let idx = c * n + i;
                    rows.push(
                        AffineRow::var(w.start + idx)
                            .plus(u.start + idx, 1.0)
                            .plus(v.start + idx, -1.0)
                            .plus_terms(predictor(layout, x, i, c))
                            .offset(-y[(i, c)]),
                    );
                    program.add_square(w.start + idx, scale(i));
                    program.add_linear(u.start + idx, scale(i) * knot);
                    program.add_linear(v.start + idx, scale(i) * knot);
                }
            }
            program.push_zero(rows);
            program.push_nonneg(u.chain(v).map(AffineRow::var).collect());
        }
        LossKind::Quantile { quantile } => {
            // y - z = u - v with u, v >= 0, cost tau u + (1 - tau) v
            let u = program.add_vars(n * k);
            let v = program.add_vars(n * k);
            let mut rows = Vec::with_capacity(n * k);
            for c in 0..k {
                for i in 0..n {
                    let idx = c * n + i;
                    rows.push(
                        AffineRow::var(u.start + idx)
                            .plus(v.start + idx, -1.0)
                            .plus_terms(predictor(layout, x, i, c))
                            .offset(-y[(i, c)]),
                    );
                    program.add_linear(u.start + idx, scale(i) * quantile);
                    program.add_linear(v.start + idx, scale(i) * (1.0 - quantile));
                }
            }
            program.push_zero(rows);
            program.push_nonneg(u.chain(v).map(AffineRow::var).collect());
        }
        LossKind::Poisson => {
            // t >= exp(z), cost t - y z
            let t = program.add_vars(n * k);
            for c in 0..k {
                for i in 0..n {
                    let var = t.start + c * n + i;
                    let z = predictor(layout, x, i, c);
                    add_predictor_cost(program, &z, -scale(i) * y[(i, c)]);
                    program.add_linear(var, scale(i));
                    program.push_exp(
                        AffineRow::default().plus_terms(z),
                        AffineRow::constant(1.0),
                        AffineRow::var(var),
                    );
                }
            }
        }
        LossKind::LogReg => {
            // t >= log(1 + exp(z)) via a >= exp(-t), e >= exp(z - t), a + e <= 1
            let t = program.add_vars(n * k);
            let a = program.add_vars(n * k);
            let e = program.add_vars(n * k);
            let mut budget = Vec::with_capacity(n * k);
            for c in 0..k {
                for i in 0..n {
                    let idx = c * n + i;
                    let (t_i, a_i, e_i) = (t.start + idx, a.start + idx, e.start + idx);
                    let z = predictor(layout, x, i, c);
                    add_predictor_cost(program, &z, -scale(i) * y[(i, c)]);
                    program.add_linear(t_i, scale(i));
                    program.push_exp(
                        AffineRow::default().plus(t_i, -1.0),
                        AffineRow::constant(1.0),
                        AffineRow::var(a_i),
                    );
                    program.push_exp(
                        AffineRow::default().plus_terms(z).plus(t_i, -1.0),
                        AffineRow::constant(1.0),
                        AffineRow::var(e_i),
                    );
                    budget.push(AffineRow::constant(1.0).plus(a_i, -1.0).plus(e_i, -1.0));
                }
            }
            program.push_nonneg(budget);
        }
        LossKind::Multinomial => {
            // t_i >= logsumexp(z_i) via e_ic >= exp(z_ic - t_i), sum_c e_ic <= 1
            let t = program.add_vars(n);
            let e = program.add_vars(n * k);
            let mut budget = Vec::with_capacity(n);
            for i in 0..n {
                let t_i = t.start + i;
                program.add_linear(t_i, scale(i));
                let mut total = AffineRow::constant(1.0);
                for c in 0..k {
                    let e_ic = e.start + c * n + i;
                    let z = predictor(layout, x, i, c);
                    add_predictor_cost(program, &z, -scale(i) * y[(i, c)]);
                    program.push_exp(
                        AffineRow::default().plus_terms(z).plus(t_i, -1.0),
                        AffineRow::constant(1.0),
                        AffineRow::var(e_ic),
                    );
                    total = total.plus(e_ic, -1.0);
                }
                budget.push(total);
            }
            program.push_nonneg(budget);
        }
    }
}

/// Add the penalty epigraph variables; their costs are the penalty slots.
fn add_penalty(
    program: &mut ConicProgram,
    layout: &Layout,
    kind: &PenaltyKind,
) -> Result<Vec<PenaltySlot>> {
    let mut slots = Vec::new();
    match kind {
        PenaltyKind::None => {}
        PenaltyKind::Lasso => {
            // a_k >= |coef_k|
            let a = program.add_vars(layout.coef.len());
            let mut rows = Vec::with_capacity(2 * layout.coef.len());
            for (idx, var) in layout.coef.clone().enumerate() {
                let a_k = a.start + idx;
                rows.push(AffineRow::var(a_k).plus(var, -1.0));
                rows.push(AffineRow::var(a_k).plus(var, 1.0));
                slots.push(PenaltySlot {
                    var: a_k,
                    weight_idx: idx,
                    default_weight: 1.0,
                });
            }
            program.push_nonneg(rows);
        }
        PenaltyKind::GroupLasso { groups } => {
            check_groups(groups, layout.n_features)?;
            for (g, idxs) in groups.iter().enumerate() {
                if idxs.is_empty() {
                    continue;
                }
                let t = program.add_vars(1).start;
                let mut rows = vec![AffineRow::var(t)];
                for &j in idxs {
                    for c in 0..layout.n_responses {
                        rows.push(AffineRow::var(layout.coef_var(j, c)));
                    }
                }
                program.push_soc(rows);
                slots.push(PenaltySlot {
                    var: t,
                    weight_idx: g,
                    default_weight: (idxs.len() as f64).sqrt(),
                });
            }
        }
        PenaltyKind::MultiTask => {
            for j in 0..layout.n_features {
                let t = program.add_vars(1).start;
                let mut rows = vec![AffineRow::var(t)];
                for c in 0..layout.n_responses {
                    rows.push(AffineRow::var(layout.coef_var(j, c)));
                }
                program.push_soc(rows);
                slots.push(PenaltySlot {
                    var: t,
                    weight_idx: j,
                    default_weight: 1.0,
                });
            }
        }
        PenaltyKind::Nuclear => {
            if !HAS_SDP {
                return Err(GlmError::NotApplicable(
                    "nuclear norm penalty needs the `sdp` feature".into(),
                ));
            }
            // ||coef||_* <= t iff [[W1, coef], [coef', W2]] is PSD with
            // (tr W1 + tr W2) / 2 <= t
            let (p, k) = (layout.n_features, layout.n_responses);
            let packed = |i: usize, j: usize| j * (j + 1) / 2 + i;
            let w1 = program.add_vars(p * (p + 1) / 2);
            let w2 = program.add_vars(k * (k + 1) / 2);
            program.push_psd(p + k, |i, j| {
                if j < p {
                    AffineRow::var(w1.start + packed(i, j))
                } else if i < p {
                    AffineRow::var(layout.coef_var(i, j - p))
                } else {
                    AffineRow::var(w2.start + packed(i - p, j - p))
                }
            });

            let t = program.add_vars(1).start;
            let traces = (0..p)
                .map(|d| (w1.start + packed(d, d), -0.5))
                .chain((0..k).map(|d| (w2.start + packed(d, d), -0.5)));
            program.push_nonneg(vec![AffineRow::var(t).plus_terms(traces)]);
            slots.push(PenaltySlot {
                var: t,
                weight_idx: 0,
                default_weight: 1.0,
            });
        }
    }
    Ok(slots)
}

/// Express the feasible set of the coefficient as cone rows.
fn add_constraint(
    program: &mut ConicProgram,
    layout: &Layout,
    constraint: &ConstraintConfig,
) -> Result<()> {
    let coef = layout.coef.clone();
    match constraint {
        ConstraintConfig::None => {}
        ConstraintConfig::Positive => {
            program.push_nonneg(coef.map(AffineRow::var).collect());
        }
        ConstraintConfig::LinearEquality { a, b } => {
            if a.ncols() != coef.len() {
                return Err(GlmError::shape(
                    format!("A with {} columns", coef.len()),
                    format!("{} columns", a.ncols()),
                ));
            }
            let rows = (0..a.nrows())
                .map(|r| {
                    AffineRow::constant(-b[r]).plus_terms(
                        coef.clone()
                            .enumerate()
                            .filter(|&(k, _)| a[(r, k)] != 0.0)
                            .map(|(k, var)| (var, a[(r, k)])),
                    )
                })
                .collect();
            program.push_zero(rows);
        }
        ConstraintConfig::Simplex { radius } => {
            program.push_nonneg(coef.clone().map(AffineRow::var).collect());
            program.push_zero(vec![
                AffineRow::constant(-radius).plus_terms(coef.map(|var| (var, 1.0)))
            ]);
        }
        ConstraintConfig::L1Ball { mult } => {
            // s_k >= |coef_k|, sum_k s_k <= mult
            let s = program.add_vars(coef.len());
            let mut rows = Vec::with_capacity(2 * coef.len() + 1);
            for (idx, var) in coef.enumerate() {
                rows.push(AffineRow::var(s.start + idx).plus(var, -1.0));
                rows.push(AffineRow::var(s.start + idx).plus(var, 1.0));
            }
            rows.push(AffineRow::constant(*mult).plus_terms(s.map(|var| (var, -1.0))));
            program.push_nonneg(rows);
        }
        ConstraintConfig::L2Ball { mult } => {
            let mut rows = vec![AffineRow::constant(*mult)];
            rows.extend(coef.map(AffineRow::var));
            program.push_soc(rows);
        }
        ConstraintConfig::Isotonic { increasing } => {
            if layout.n_responses != 1 {
                return Err(GlmError::shape(
                    "a coefficient vector",
                    format!("{} responses", layout.n_responses),
                ));
            }
            let sign = if *increasing { 1.0 } else { -1.0 };
            let rows = coef
                .clone()
                .zip(coef.skip(1))
                .map(|(prev, next)| AffineRow::default().plus(next, sign).plus(prev, -sign))
                .collect();
            program.push_nonneg(rows);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PenaltyFlavor;
    use crate::solver::SolveStatus;

    fn toy() -> (DMatrix<f64>, DMatrix<f64>) {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0, -1.0, 2.0]);
        let y = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 1.0]);
        (x, y)
    }

    #[test]
    fn test_nonconvex_not_applicable() {
        let solver = ConvexSolver::default();
        for flavor in [PenaltyFlavor::NonConvex, PenaltyFlavor::Mixed] {
            let penalty = PenaltyConfig::lasso(1.0).with_flavor(flavor);
            assert!(!solver.is_applicable(&LossSpec::lin_reg(), &penalty, &ConstraintConfig::None));
        }
    }

    #[test]
    fn test_setup_rejects_inapplicable() {
        let (x, y) = toy();
        let mut solver = ConvexSolver::default();
        let problem = GlmProblem::new(LossSpec::lin_reg())
            .penalty(PenaltyConfig::lasso(1.0).with_flavor(PenaltyFlavor::NonConvex));
        let err = solver.setup(&x, &y, None, &problem).unwrap_err();
        assert!(matches!(err, GlmError::NotApplicable(_)));
        assert!(!solver.is_setup());
    }

    #[test]
    fn test_calls_before_setup_fail() {
        let mut solver = ConvexSolver::default();
        assert!(matches!(
            solver.update_penalty(&PenaltyUpdate::pen_val(1.0)),
            Err(GlmError::InvalidProblem(_))
        ));
        assert!(matches!(
            solver.solve(&WarmStart::default()),
            Err(GlmError::InvalidProblem(_))
        ));
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_update_penalty_keeps_program() {
        let (x, y) = toy();
        let mut solver = ConvexSolver::default();
        let problem = GlmProblem::new(LossSpec::lin_reg()).penalty(PenaltyConfig::lasso(0.1));
        solver.setup(&x, &y, None, &problem).unwrap();
        let size = solver.program_size();

        solver
            .update_penalty(&PenaltyUpdate::pen_val(0.5).with_weights(DMatrix::from_element(2, 1, 2.0)))
            .unwrap();
        assert_eq!(solver.program_size(), size);
        assert_eq!(solver.penalty().map(|p| p.pen_val), Some(0.5));

        let bad = PenaltyUpdate::default().with_weights(DMatrix::from_element(3, 1, 1.0));
        assert!(solver.update_penalty(&bad).is_err());
        assert_eq!(solver.penalty().map(|p| p.pen_val), Some(0.5));
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_linear_cost_tracks_penalty() {
        let (x, y) = toy();
        let mut solver = ConvexSolver::default();
        let problem = GlmProblem::new(LossSpec::lin_reg())
            .penalty(PenaltyConfig::lasso(1.0).with_weight_vec(&[1.0, 0.0]));
        solver.setup(&x, &y, None, &problem).unwrap();

        let state = solver.state.as_ref().unwrap();
        let q = state.linear_cost();
        assert_eq!(q.len(), state.problem.q.len());
        let costs: Vec<f64> = state.slots.iter().map(|s| q[s.var]).collect();
        assert_eq!(costs, vec![1.0, 0.0]);

        solver.update_penalty(&PenaltyUpdate::pen_val(3.0)).unwrap();
        let state = solver.state.as_ref().unwrap();
        let q = state.linear_cost();
        let costs: Vec<f64> = state.slots.iter().map(|s| q[s.var]).collect();
        assert_eq!(costs, vec![3.0, 0.0]);
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_isotonic_needs_vector_coef() {
        let (x, _) = toy();
        let y = DMatrix::from_element(4, 2, 1.0);
        let mut solver = ConvexSolver::default();
        let problem = GlmProblem::new(LossSpec::lin_reg_mr())
            .constraint(ConstraintConfig::Isotonic { increasing: true });
        let err = solver.setup(&x, &y, None, &problem).unwrap_err();
        assert!(matches!(err, GlmError::DimensionMismatch { .. }));
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_warm_start_shape_checked() {
        let (x, y) = toy();
        let mut solver = ConvexSolver::default();
        solver
            .setup(&x, &y, None, &GlmProblem::new(LossSpec::lin_reg()))
            .unwrap();
        let init = WarmStart {
            coef: Some(DMatrix::zeros(3, 1)),
            ..WarmStart::default()
        };
        assert!(matches!(
            solver.solve(&init),
            Err(GlmError::DimensionMismatch { .. })
        ));
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_state_tracks_warm_start_and_solution() {
        let (x, y) = toy();
        let mut solver = ConvexSolver::default();
        solver
            .setup(&x, &y, None, &GlmProblem::new(LossSpec::lin_reg()))
            .unwrap();
        assert_eq!(solver.current_coef(), Some(&DMatrix::zeros(2, 1)));
        assert!(solver.aux_state().is_none());

        let (output, aux, _) = solver.solve(&WarmStart::default()).unwrap();
        assert_eq!(solver.current_coef(), Some(&output.coef));
        assert_eq!(solver.current_intercept(), output.intercept.as_ref());
        assert_eq!(solver.aux_state(), aux.as_ref());
        let n_vars = solver.program_size().unwrap().0;
        assert_eq!(solver.aux_state().unwrap().primal.len(), n_vars);

        // a warm start becomes the current iterate
        let init = WarmStart {
            coef: Some(DMatrix::from_element(2, 1, 7.0)),
            intercept: Some(DVector::from_element(1, -1.0)),
            other: None,
        };
        solver.state.as_mut().unwrap().apply_warm_start(&init).unwrap();
        assert_eq!(solver.current_coef(), init.coef.as_ref());
        assert_eq!(solver.current_intercept(), init.intercept.as_ref());
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_iteration_limit_returns_last_iterate() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0, -1.0, 2.0]);
        let y = DMatrix::from_column_slice(4, 1, &[1.0, 0.0, 1.0, 0.0]);
        let mut solver = ConvexSolver::new(SolverSettings {
            max_iter: 1,
            ..SolverSettings::default()
        });
        let problem = GlmProblem::new(LossSpec::log_reg()).penalty(PenaltyConfig::lasso(0.01));
        solver.setup(&x, &y, None, &problem).unwrap();

        let (output, aux, info) = solver.solve(&WarmStart::default()).unwrap();
        assert_eq!(info.status, SolveStatus::MaxIterations);
        assert_eq!(info.status.to_string(), "max_iterations");
        assert!(info.iterations <= 1);
        assert_eq!(output.coef.shape(), (2, 1));
        assert!(aux.is_some());
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_infeasible_constraint_is_an_error() {
        let (x, y) = toy();
        let constraint = ConstraintConfig::LinearEquality {
            a: DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]),
            b: DVector::from_vec(vec![1.0, 2.0]),
        };
        let mut solver = ConvexSolver::default();
        let problem = GlmProblem::new(LossSpec::lin_reg()).constraint(constraint);
        solver.setup(&x, &y, None, &problem).unwrap();
        assert!(matches!(
            solver.solve(&WarmStart::default()),
            Err(GlmError::SolverFailed { .. })
        ));
    }

    #[test]
    fn test_nuclear_needs_uniform_weights() {
        assert!(uniform_weights(None));
        assert!(uniform_weights(Some(&DMatrix::from_element(2, 1, 3.0))));
        assert!(!uniform_weights(Some(&DMatrix::from_column_slice(2, 1, &[1.0, 2.0]))));

        let solver = ConvexSolver::default();
        let weighted = PenaltyConfig::nuclear(1.0).with_weight_vec(&[1.0, 2.0]);
        let loss = LossSpec::lin_reg_mr();
        assert!(!solver.is_applicable(&loss, &weighted, &ConstraintConfig::None));
        assert_eq!(
            solver.is_applicable(&loss, &PenaltyConfig::nuclear(1.0), &ConstraintConfig::None),
            HAS_SDP
        );
    }

    #[cfg(feature = "sdp")]
    #[test]
    fn test_nuclear_norm_matches_singular_value_thresholding() {
        // X = 2 I without intercept: coef = prox of the nuclear norm at y / 2 with step 1/2
        let x = DMatrix::identity(2, 2) * 2.0;
        let y = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 0.0, 2.0]);
        let problem = GlmProblem::new(LossSpec::lin_reg_mr())
            .penalty(PenaltyConfig::nuclear(1.0))
            .fit_intercept(false);
        let mut solver = ConvexSolver::default();
        solver.setup(&x, &y, None, &problem).unwrap();
        let (output, _, info) = solver.solve(&WarmStart::default()).unwrap();
        assert!(info.status.is_solved());

        use crate::prox::{Func, NuclearNorm};
        let expected = NuclearNorm::new(1.0, None)
            .prox(&(&y / 2.0), 0.5)
            .unwrap();
        assert!((output.coef - expected).amax() < 1e-5);
    }
}
