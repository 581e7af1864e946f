use crate::MechanismError;
use cca_core::{
    models::{
        Allocation, BidSet, BidderId, Bundle, Comparison, Constraint, GoodId, MAX_VALUE, Map,
        Program, Sense, SolveStatus, VarId, Variable,
    },
    ports::MipSolver,
};
use std::time::Duration;
use tracing::{Level, event};

/// Decisions within this distance of 1 count as accepted
const ACCEPTANCE_TOLERANCE: f64 = 1e-3;

/// Objective coefficients are scaled down to at most this share of [`MAX_VALUE`]
const SCALING_HEADROOM: f64 = 0.9;

/// Winner determination over XOR bids.
///
/// Each bid entry becomes a binary decision. The program maximizes the sum of
/// accepted entry values subject to
///
/// - every good being allocated at most once, and
/// - every bidder getting at most one entry accepted.
///
/// When the largest bid value exceeds the solver's numeric range, all objective
/// coefficients are divided by the same factor. [`Allocation`]s are always
/// reported in declared units.
#[derive(Debug, Clone)]
pub struct WinnerDetermination {
    bids: BidSet,
    program: Program,
    decisions: Map<BidderId, Vec<VarId>>,
    scaling_factor: f64,
    time_limit: Option<Duration>,
}

impl WinnerDetermination {
    /// Build the winner determination program of `bids`
    pub fn new(bids: BidSet) -> Self {
        let max_value = bids.max_value();
        let scaling_factor = if max_value > SCALING_HEADROOM * MAX_VALUE {
            SCALING_HEADROOM * MAX_VALUE / max_value
        } else {
            1.0
        };
        if scaling_factor < 1.0 {
            event!(
                Level::DEBUG,
                max_value,
                scaling_factor,
                "scaling bid values into the solver range"
            );
        }

        let mut program = Program::new(Sense::Maximize);
        let mut decisions = Map::default();
        let mut by_good: Map<GoodId, Vec<VarId>> = Map::default();

        for bid in bids.iter() {
            let mut vars = Vec::with_capacity(bid.len());
            for entry in bid.entries() {
                let var = program.add_variable(Variable::binary(format!(
                    "b{}_e{}",
                    bid.bidder(),
                    entry.id()
                )));
                program.add_objective_term(entry.value() * scaling_factor, var);
                for good in entry.bundle().iter() {
                    by_good.entry(good).or_default().push(var);
                }
                vars.push(var);
            }
            if vars.len() > 1 {
                program.add_constraint(vars.iter().fold(
                    Constraint::new(Comparison::Leq, 1.0),
                    |constraint, &var| constraint.with_term(1.0, var),
                ));
            }
            decisions.insert(bid.bidder(), vars);
        }

        for (_, vars) in by_good {
            if vars.len() > 1 {
                program.add_constraint(vars.into_iter().fold(
                    Constraint::new(Comparison::Leq, 1.0),
                    |constraint, var| constraint.with_term(1.0, var),
                ));
            }
        }

        Self {
            bids,
            program,
            decisions,
            scaling_factor,
            time_limit: None,
        }
    }

    /// Limit every solve of this program (and of its copies) to `time_limit`
    pub fn with_time_limit(mut self, time_limit: Option<Duration>) -> Self {
        self.time_limit = time_limit;
        self
    }

    /// The bids this program decides on
    pub fn bids(&self) -> &BidSet {
        &self.bids
    }

    /// The underlying program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The factor bid values were multiplied with in the objective
    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// The time limit of every solve
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    /// The same winner determination with one bidder's bids removed
    pub fn without_bidder(&self, bidder: BidderId) -> Self {
        Self::new(self.bids.without(bidder)).with_time_limit(self.time_limit)
    }

    /// A copy whose objective subtracts `payoffs[b]` whenever bidder `b` wins
    /// anything.
    ///
    /// Payoffs are in objective units, i.e. already multiplied by
    /// [`Self::scaling_factor`]. The allocation of the copy still reports
    /// declared bid values, without the subtracted payoffs.
    pub fn reweighted_copy(&self, payoffs: &Map<BidderId, f64>) -> Self {
        let mut copy = self.clone();
        for (&bidder, vars) in &self.decisions {
            let Some(&payoff) = payoffs.get(&bidder) else {
                continue;
            };
            if vars.is_empty() {
                continue;
            }

            let wins = copy
                .program
                .add_variable(Variable::binary(format!("b{bidder}_wins")));
            copy.program.add_objective_term(-payoff, wins);

            // `wins` is 1 exactly when one of the bidder's entries is accepted
            let mut lower = Constraint::new(Comparison::Geq, 0.0);
            let mut upper = Constraint::new(Comparison::Leq, 0.0);
            lower.add_term(-1.0, wins);
            upper.add_term(-(vars.len() as f64), wins);
            for &var in vars {
                lower.add_term(1.0, var);
                upper.add_term(1.0, var);
            }
            copy.program.add_constraint(lower);
            copy.program.add_constraint(upper);
        }
        copy
    }

    /// Solve the program and read off the allocation.
    ///
    /// A bid set without entries allocates nothing. Allocating nothing is
    /// always feasible, so a solve stopped by its time limit still returns an
    /// allocation, the best one found. Any solver failure, infeasibility
    /// included, is returned as is.
    pub fn solve<S: MipSolver>(&self, solver: &S) -> Result<Allocation, MechanismError> {
        if self.decisions.values().all(Vec::is_empty) {
            return Ok(Allocation::empty());
        }

        let solution = solver
            .solve(&self.program, self.time_limit)
            .map_err(MechanismError::solver("winner determination"))?;

        if solution.status == SolveStatus::TimeLimited {
            event!(
                Level::WARN,
                objective = solution.objective,
                "winner determination hit its time limit, using the best allocation found"
            );
        }

        let trades = self.decisions.iter().filter_map(|(&bidder, vars)| {
            let bid = self.bids.get(bidder)?;
            let accepted = bid
                .entries()
                .iter()
                .zip(vars)
                .filter(|(_, var)| (solution.value(**var) - 1.0).abs() <= ACCEPTANCE_TOLERANCE)
                .fold((Bundle::empty(), 0.0), |(bundle, value), (entry, _)| {
                    (bundle.union(entry.bundle()), value + entry.value())
                });
            Some((bidder, accepted.0, accepted.1))
        });
        let allocation = Allocation::new(trades);

        event!(
            Level::DEBUG,
            winners = allocation.winners().len(),
            total_value = allocation.total_value(),
            "winner determination solved"
        );
        Ok(allocation)
    }
}
