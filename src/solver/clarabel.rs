//! Clarabel solver integration.
//!
//! Converts a stuffed conic program into Clarabel's format, runs the
//! interior-point solver and maps the result back.

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use super::program::{Cone, ConicSolution, SolveStatus, StuffedProblem};
use super::SolverSettings;
use crate::error::{GlmError, Result};

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved => SolveStatus::Optimal,
            SolverStatus::AlmostSolved => SolveStatus::AlmostOptimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::MaxIterations => SolveStatus::MaxIterations,
            SolverStatus::MaxTime => SolveStatus::MaxTime,
            SolverStatus::NumericalError | SolverStatus::InsufficientProgress => {
                SolveStatus::NumericalError
            }
            _ => SolveStatus::Unknown,
        }
    }
}

/// Solve the stuffed problem with linear cost `q` using Clarabel.
pub fn solve(problem: &StuffedProblem, q: &[f64], settings: &SolverSettings) -> Result<ConicSolution> {
    let p = to_clarabel_csc(&problem.p);
    let a = to_clarabel_csc(&problem.a);
    let cones = to_clarabel_cones(&problem.cones)?;

    let clarabel_settings = DefaultSettingsBuilder::default()
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .time_limit(settings.time_limit)
        .tol_gap_abs(settings.tol_gap_abs)
        .tol_gap_rel(settings.tol_gap_rel)
        .build()
        .map_err(|e| GlmError::InvalidConfig(format!("solver settings: {}", e)))?;

    let mut solver = DefaultSolver::new(&p, q, &a, &problem.b, &cones, clarabel_settings);
    solver.solve();

    Ok(ConicSolution {
        status: solver.solution.status.into(),
        x: solver.solution.x.clone(),
        z: solver.solution.z.clone(),
        solve_time: solver.solution.solve_time,
        iterations: solver.info.iterations,
    })
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

fn to_clarabel_cones(cones: &[Cone]) -> Result<Vec<SupportedConeT<f64>>> {
    cones
        .iter()
        .map(|cone| match *cone {
            Cone::Zero(d) => Ok(SupportedConeT::ZeroConeT(d)),
            Cone::NonNeg(d) => Ok(SupportedConeT::NonnegativeConeT(d)),
            Cone::SecondOrder(d) => Ok(SupportedConeT::SecondOrderConeT(d)),
            Cone::Exponential => Ok(SupportedConeT::ExponentialConeT()),
            Cone::PsdTriangle(n) => psd_cone(n),
        })
        .collect()
}

#[cfg(feature = "sdp")]
fn psd_cone(n: usize) -> Result<SupportedConeT<f64>> {
    Ok(SupportedConeT::PSDTriangleConeT(n))
}

#[cfg(not(feature = "sdp"))]
fn psd_cone(_n: usize) -> Result<SupportedConeT<f64>> {
    Err(GlmError::MissingDependency(
        "semidefinite cones need the `sdp` feature".into(),
    ))
}
