//! MILP objective builders over binary lineup selectors.
//!
//! Builders translate a scenario matrix and a vector of binary selection
//! variables `x_i` into auxiliary variables, constraints, and an objective
//! expression. They never solve; the portfolio generator assembles the model.
//!
//! ## Bounded upper-tail CVaR (maximization)
//!
//! For lineup points `p_k(x) = Σ_i s_{k,i}·x_i` the Rockafellar-Uryasev
//! slack adaptation is:
//!
//! ```text
//! maximize   ζ + 1/((1-α)·S) · Σ_k u_k
//! subject to u_k ≥ p_k(x) − ζ
//!            0 ≤ u_k ≤ R·(max_cell − min_cell)      (mandatory)
//!            R·min_cell ≤ ζ ≤ R·max_cell
//! ```
//!
//! where `R` is the roster size and min/max_cell are scenario-cell extrema.
//! Without the `u_k` upper bound the LP is unbounded under maximization:
//! the solver pushes ζ to its floor and inflates every slack. The bound is
//! wide enough to be inactive at any optimum, so it never cuts off a real
//! solution.
//!
//! Auxiliary variable names carry a caller-supplied prefix so several
//! quantile families can coexist in one model (see [`multi_cvar`]).

use good_lp::{constraint, variable, Constraint, Expression, ProblemVariables, Variable};
use slipstream_core::{SlipResult, SlipstreamError};
use slipstream_scenarios::ScenarioMatrix;

/// Raw auxiliary-variable view of one CVaR family: the threshold `ζ`, the
/// per-scenario excess slacks, the CVaR expression, and the constraints that
/// tie them to the selection. Callers either hand the whole family to
/// [`CvarAux::attach`] or compose custom weightings from `expression` and
/// attach the constraints themselves.
pub struct CvarAux {
    pub zeta: Variable,
    pub excess: Vec<Variable>,
    pub expression: Expression,
    pub constraints: Vec<Constraint>,
}

impl CvarAux {
    /// Attach this family's constraints to an assembled model.
    pub fn attach<M: good_lp::SolverModel>(self, mut model: M) -> M {
        for c in self.constraints {
            model = model.with(c);
        }
        model
    }
}

fn check_alpha(alpha: f64) -> SlipResult<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(SlipstreamError::InvalidAlpha(alpha))
    }
}

fn check_selection(selection: &[Variable], matrix: &ScenarioMatrix) -> SlipResult<()> {
    if selection.is_empty() {
        return Err(SlipstreamError::EmptyScenarios(
            "objective builder: no selection variables".into(),
        ));
    }
    if selection.len() != matrix.n_drivers() {
        return Err(SlipstreamError::Validation(format!(
            "selection length {} != scenario columns {}",
            selection.len(),
            matrix.n_drivers()
        )));
    }
    Ok(())
}

/// Per-scenario lineup points expression `p_k(x) = Σ_i s_{k,i}·x_i`.
fn scenario_points(matrix: &ScenarioMatrix, selection: &[Variable], k: usize) -> Expression {
    let mut expr = Expression::from(0.0);
    for (i, x) in selection.iter().enumerate() {
        expr += matrix.row(k)[i] * *x;
    }
    expr
}

/// Mean objective: `Σ_i mean_i·x_i` where `mean_i` is the per-driver
/// scenario mean. Used for the real mean-optimized baseline.
pub fn mean_objective(
    selection: &[Variable],
    matrix: &ScenarioMatrix,
) -> SlipResult<Expression> {
    check_selection(selection, matrix)?;
    let mut expr = Expression::from(0.0);
    for (i, x) in selection.iter().enumerate() {
        expr += matrix.means()[i] * *x;
    }
    Ok(expr)
}

/// Standard Rockafellar-Uryasev CVaR in minimization form over losses
/// `loss_k(x) = −p_k(x)`:
///
/// ```text
/// minimize ζ + 1/((1-α)·S) · Σ_k u_k,   u_k ≥ loss_k(x) − ζ,  u_k ≥ 0
/// ```
///
/// A sub-expression for downside control; not the tournament objective.
pub fn shortfall_cvar(
    vars: &mut ProblemVariables,
    selection: &[Variable],
    matrix: &ScenarioMatrix,
    alpha: f64,
    prefix: &str,
) -> SlipResult<CvarAux> {
    check_alpha(alpha)?;
    check_selection(selection, matrix)?;
    let s = matrix.n_scenarios();
    let zeta = vars.add(variable().name(format!("{prefix}_zeta")));
    let mut excess = Vec::with_capacity(s);
    let mut constraints = Vec::with_capacity(s);
    let mut slack_sum = Expression::from(0.0);
    for k in 0..s {
        let u = vars.add(variable().min(0.0).name(format!("{prefix}_u{k}")));
        let loss = Expression::from(0.0) - scenario_points(matrix, selection, k);
        constraints.push(constraint!(u >= loss - zeta));
        slack_sum += u;
        excess.push(u);
    }
    let scale = 1.0 / ((1.0 - alpha) * s as f64);
    let expression = Expression::from(zeta) + scale * slack_sum;
    Ok(CvarAux {
        zeta,
        excess,
        expression,
        constraints,
    })
}

/// Bounded upper-tail CVaR family for maximization (see the module docs for
/// the formulation and why the slack bound is mandatory).
pub fn upper_tail_cvar(
    vars: &mut ProblemVariables,
    selection: &[Variable],
    matrix: &ScenarioMatrix,
    alpha: f64,
    n_roster: usize,
    prefix: &str,
) -> SlipResult<CvarAux> {
    check_alpha(alpha)?;
    check_selection(selection, matrix)?;
    if n_roster == 0 {
        return Err(SlipstreamError::Validation(
            "upper-tail CVaR needs a positive roster size".into(),
        ));
    }
    let s = matrix.n_scenarios();
    let r = n_roster as f64;
    let zeta_lo = r * matrix.min_cell();
    let zeta_hi = r * matrix.max_cell();
    let max_excess = r * (matrix.max_cell() - matrix.min_cell());

    let zeta = vars.add(
        variable()
            .min(zeta_lo)
            .max(zeta_hi)
            .name(format!("{prefix}_zeta")),
    );
    let mut excess = Vec::with_capacity(s);
    let mut constraints = Vec::with_capacity(s);
    let mut slack_sum = Expression::from(0.0);
    for k in 0..s {
        let u = vars.add(
            variable()
                .min(0.0)
                .max(max_excess)
                .name(format!("{prefix}_u{k}")),
        );
        let points = scenario_points(matrix, selection, k);
        constraints.push(constraint!(u >= points - zeta));
        slack_sum += u;
        excess.push(u);
    }
    let scale = 1.0 / ((1.0 - alpha) * s as f64);
    let expression = Expression::from(zeta) + scale * slack_sum;
    Ok(CvarAux {
        zeta,
        excess,
        expression,
        constraints,
    })
}

/// Weighted multi-quantile upper-tail CVaR: `Σ_j w_j·CVaR_{α_j}`, one
/// `(ζ_j, u_{j,k})` family per quantile with a unique prefix each
/// (`{prefix}_a{percent}`), so variable names stay pairwise distinct.
///
/// Returns the combined expression plus the per-quantile families for
/// callers that want custom weightings.
pub fn multi_cvar(
    vars: &mut ProblemVariables,
    selection: &[Variable],
    matrix: &ScenarioMatrix,
    quantiles: &[(f64, f64)],
    n_roster: usize,
    prefix: &str,
) -> SlipResult<(Expression, Vec<CvarAux>)> {
    if quantiles.is_empty() {
        return Err(SlipstreamError::Validation(
            "multi-CVaR needs at least one (alpha, weight) pair".into(),
        ));
    }
    let mut expression = Expression::from(0.0);
    let mut families = Vec::with_capacity(quantiles.len());
    for (j, (alpha, weight)) in quantiles.iter().enumerate() {
        // Basis-point label keeps 0.99 and 0.995 distinct; the index breaks
        // ties for repeated quantiles.
        let family_prefix = format!("{prefix}_a{}_{j}", (alpha * 10_000.0).round() as u64);
        let aux = upper_tail_cvar(vars, selection, matrix, *alpha, n_roster, &family_prefix)?;
        expression += *weight * aux.expression.clone();
        families.push(aux);
    }
    Ok((expression, families))
}

/// Default tournament weighting: 0.70·CVaR(0.99) + 0.30·CVaR(0.95).
pub fn default_quantiles() -> Vec<(f64, f64)> {
    vec![(0.99, 0.70), (0.95, 0.30)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::variables;

    fn matrix() -> ScenarioMatrix {
        ScenarioMatrix::from_rows(
            vec![
                10.0, 5.0, 2.0, //
                20.0, 6.0, 1.0, //
                15.0, 4.0, 3.0, //
                30.0, 8.0, 2.5, //
            ],
            4,
            3,
        )
        .unwrap()
    }

    fn selection(vars: &mut ProblemVariables, n: usize) -> Vec<Variable> {
        (0..n)
            .map(|i| vars.add(variable().binary().name(format!("x_{i}"))))
            .collect()
    }

    #[test]
    fn rejects_bad_alpha_and_empty_selection() {
        let m = matrix();
        let mut vars = variables!();
        let x = selection(&mut vars, 3);
        assert!(upper_tail_cvar(&mut vars, &x, &m, 1.0, 6, "cv").is_err());
        assert!(upper_tail_cvar(&mut vars, &x, &m, 0.0, 6, "cv").is_err());
        assert!(upper_tail_cvar(&mut vars, &[], &m, 0.9, 6, "cv").is_err());
    }

    #[test]
    fn builder_emits_one_slack_per_scenario() {
        let m = matrix();
        let mut vars = variables!();
        let x = selection(&mut vars, 3);
        let aux = upper_tail_cvar(&mut vars, &x, &m, 0.75, 2, "cv").unwrap();
        assert_eq!(aux.excess.len(), m.n_scenarios());
        assert_eq!(aux.constraints.len(), m.n_scenarios());
    }

    #[test]
    fn multi_cvar_builds_one_family_per_quantile() {
        let m = matrix();
        let mut vars = variables!();
        let x = selection(&mut vars, 3);
        let (_, families) =
            multi_cvar(&mut vars, &x, &m, &default_quantiles(), 2, "obj").unwrap();
        assert_eq!(families.len(), 2);
        // Families are distinct variable sets.
        assert_ne!(families[0].zeta, families[1].zeta);
        for (a, b) in families[0].excess.iter().zip(&families[1].excess) {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn selection_length_must_match_columns() {
        let m = matrix();
        let mut vars = variables!();
        let x = selection(&mut vars, 2);
        assert!(mean_objective(&x, &m).is_err());
    }
}
