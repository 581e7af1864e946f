//! A small, solver-agnostic model of a mixed-integer program.
//!
//! Mechanisms build a [`Program`], hand it to a [`crate::ports::MipSolver`]
//! and read the variable values back from the returned [`Solution`]. Programs
//! are plain values, so "copy and modify" is simply `clone` followed by more
//! `add_*` calls.

/// The largest objective coefficient the solving service is expected to handle
/// without loss of precision. Objectives are scaled below 90% of this value.
pub const MAX_VALUE: f64 = 536_870_910.0;

/// An index into the variables of a [`Program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    /// The position of the variable in the program (and in the solution vector)
    pub fn index(self) -> usize {
        self.0
    }
}

/// The domain of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// 0 or 1
    Binary,
    /// Any integer within the bounds
    Integer,
    /// Any real within the bounds
    Continuous,
}

/// A decision variable with its (possibly infinite) bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// A human readable name, used in logs
    pub name: String,
    /// The domain of the variable
    pub kind: VarKind,
    /// The lower bound, or -inf
    pub lower: f64,
    /// The upper bound, or +inf
    pub upper: f64,
}

impl Variable {
    /// A 0/1 variable
    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// A continuous variable within `[lower, upper]`
    pub fn continuous(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Continuous,
            lower,
            upper,
        }
    }

    /// An integer variable within `[lower, upper]`
    pub fn integer(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Integer,
            lower,
            upper,
        }
    }

    /// Whether a solver has to branch on this variable
    pub fn is_integral(&self) -> bool {
        !matches!(self.kind, VarKind::Continuous)
    }
}

/// The relation of a linear constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// lhs <= rhs
    Leq,
    /// lhs >= rhs
    Geq,
    /// lhs == rhs
    Eq,
}

/// A linear constraint `Σ coefficient * variable (cmp) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    terms: Vec<(VarId, f64)>,
    comparison: Comparison,
    rhs: f64,
}

impl Constraint {
    /// A constraint without terms yet
    pub fn new(comparison: Comparison, rhs: f64) -> Self {
        Self {
            terms: Vec::new(),
            comparison,
            rhs,
        }
    }

    /// Add `coefficient * var` to the left hand side
    pub fn add_term(&mut self, coefficient: f64, var: VarId) -> &mut Self {
        self.terms.push((var, coefficient));
        self
    }

    /// Builder-style variant of [`Constraint::add_term`]
    pub fn with_term(mut self, coefficient: f64, var: VarId) -> Self {
        self.add_term(coefficient, var);
        self
    }

    /// The (variable, coefficient) pairs of the left hand side
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    /// The relation
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// The right hand side
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Whether the constraint has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `values` satisfy the constraint up to `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self
            .terms
            .iter()
            .map(|(var, coefficient)| coefficient * values[var.index()])
            .sum::<f64>();
        match self.comparison {
            Comparison::Leq => lhs <= self.rhs + tolerance,
            Comparison::Geq => lhs >= self.rhs - tolerance,
            Comparison::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// The direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Maximize the objective
    Maximize,
    /// Minimize the objective
    Minimize,
}

/// A mixed-integer program with a linear-plus-quadratic objective and linear constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    sense: Sense,
    variables: Vec<Variable>,
    linear: Vec<(VarId, f64)>,
    quadratic: Vec<(VarId, VarId, f64)>,
    constraints: Vec<Constraint>,
}

impl Program {
    /// An empty program
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            variables: Vec::new(),
            linear: Vec::new(),
            quadratic: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Register a variable and return its handle
    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable);
        VarId(self.variables.len() - 1)
    }

    /// Add `coefficient * var` to the objective
    pub fn add_objective_term(&mut self, coefficient: f64, var: VarId) {
        self.linear.push((var, coefficient));
    }

    /// Add `coefficient * a * b` to the objective
    pub fn add_quadratic_term(&mut self, coefficient: f64, a: VarId, b: VarId) {
        self.quadratic.push((a, b, coefficient));
    }

    /// Add a constraint
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Replace the objective by nothing, keeping variables and constraints
    pub fn clear_objective(&mut self) {
        self.linear.clear();
        self.quadratic.clear();
    }

    /// Change the direction of optimization
    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = sense;
    }

    /// The direction of optimization
    pub fn sense(&self) -> Sense {
        self.sense
    }

    /// The variables, indexed by [`VarId::index`]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The variable behind a handle
    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.index()]
    }

    /// The linear objective terms
    pub fn linear_terms(&self) -> &[(VarId, f64)] {
        &self.linear
    }

    /// The quadratic objective terms
    pub fn quadratic_terms(&self) -> &[(VarId, VarId, f64)] {
        &self.quadratic
    }

    /// The constraints
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Whether any variable requires integrality
    pub fn is_integral(&self) -> bool {
        self.variables.iter().any(Variable::is_integral)
    }

    /// The objective value at `values`
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let linear = self
            .linear
            .iter()
            .map(|(var, coefficient)| coefficient * values[var.index()])
            .sum::<f64>();
        let quadratic = self
            .quadratic
            .iter()
            .map(|(a, b, coefficient)| coefficient * values[a.index()] * values[b.index()])
            .sum::<f64>();
        linear + quadratic
    }

    /// Whether `values` respect every bound and constraint up to `tolerance`
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.variables.len()
            && self.variables.iter().zip(values).all(|(variable, &x)| {
                x >= variable.lower - tolerance && x <= variable.upper + tolerance
            })
            && self
                .constraints
                .iter()
                .all(|constraint| constraint.is_satisfied(values, tolerance))
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal within the solver's tolerances
    Optimal,
    /// The time limit was hit; the solution is the best incumbent found
    TimeLimited,
}

/// The values of a solved program
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// One value per variable, indexed by [`VarId::index`]
    pub values: Vec<f64>,
    /// The objective value
    pub objective: f64,
    /// Whether the solution is proven optimal
    pub status: SolveStatus,
}

impl Solution {
    /// The value of a variable
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }
}
