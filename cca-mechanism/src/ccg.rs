use crate::{AuctionMechanism, MechanismError, VcgMechanism, WinnerDetermination};
use cca_core::{
    models::{
        Allocation, BidderId, Comparison, Constraint, Map, MechanismResult, Payment, Program,
        Sense, Solution, SolveStatus, VarId, Variable,
    },
    ports::MipSolver,
};
use std::sync::OnceLock;
use tracing::{Level, event, span};

/// Payments are in the core once no coalition beats them by more than this
/// share of the largest trade value
const CORE_TOLERANCE: f64 = 1e-6;

/// Relative half-width of the window fixing the total payment in the
/// quadratic step
const FIX_TOLERANCE: f64 = 1e-6;

/// Core-selecting payments closest to VCG.
///
/// Starting from VCG payments, the mechanism repeatedly looks for the
/// coalition that blocks the current payments the most. If it beats them, a
/// cut requiring the non-members to pay at least the shortfall is added, the
/// minimal total payment satisfying all cuts is found, and among the payment
/// vectors with that total the one closest to VCG in Euclidean distance is
/// taken. The allocation is the VCG allocation.
///
/// The payment programs are solved in units of the largest trade value, so
/// their data stays close to 1 whatever the magnitude of the bids.
pub struct CcgMechanism<S> {
    wdp: WinnerDetermination,
    solver: S,
    result: OnceLock<MechanismResult>,
}

impl<S: MipSolver> CcgMechanism<S> {
    /// Price the winners of `wdp`, solving every program with `solver`
    pub fn new(wdp: WinnerDetermination, solver: S) -> Self {
        Self {
            wdp,
            solver,
            result: OnceLock::new(),
        }
    }

    /// The winner determination the payments are based on
    pub fn winner_determination(&self) -> &WinnerDetermination {
        &self.wdp
    }

    pub(crate) fn calculate(&self) -> Result<MechanismResult, MechanismError> {
        let span = span!(Level::INFO, "ccg", bidders = self.wdp.bids().len());
        let _guard = span.enter();

        let vcg = VcgMechanism::new(self.wdp.clone(), &self.solver).calculate()?;
        let allocation = vcg.allocation;
        let winners: Vec<BidderId> = allocation.winners().collect();
        let unit = winners
            .iter()
            .map(|&bidder| allocation.trade_value(bidder))
            .fold(0.0, f64::max);
        if unit <= 0.0 {
            return Ok(self.finish(allocation, vcg.payment, 0));
        }
        let objective_unit = unit * self.wdp.scaling_factor();
        let time_limit = self.wdp.time_limit();

        // everything below is in multiples of `unit`
        let trade_values: Map<BidderId, f64> = winners
            .iter()
            .map(|&bidder| (bidder, allocation.trade_value(bidder) / unit))
            .collect();
        let vcg_payments: Map<BidderId, f64> = winners
            .iter()
            .map(|&bidder| (bidder, vcg.payment.payment_of(bidder) / unit))
            .collect();

        let mut core = Program::new(Sense::Minimize);
        let variables: Map<BidderId, VarId> = winners
            .iter()
            .map(|&bidder| {
                let var = core.add_variable(Variable::continuous(
                    format!("p{bidder}"),
                    0.0,
                    trade_values[&bidder],
                ));
                core.add_objective_term(1.0, var);
                (bidder, var)
            })
            .collect();

        let mut payments = vcg_payments.clone();
        let mut previous_blocking = None;
        let mut iteration = 0usize;

        loop {
            iteration += 1;
            let payoffs: Map<BidderId, f64> = winners
                .iter()
                .map(|&bidder| (bidder, trade_values[&bidder] - payments[&bidder]))
                .collect();

            // the reweighted program takes its payoffs in objective units
            let objective_payoffs: Map<BidderId, f64> = payoffs
                .iter()
                .map(|(&bidder, &payoff)| (bidder, payoff * objective_unit))
                .collect();
            let coalition = self
                .wdp
                .reweighted_copy(&objective_payoffs)
                .solve(&self.solver)?;
            let traitors: Vec<BidderId> = winners
                .iter()
                .copied()
                .filter(|&bidder| coalition.is_winner(bidder))
                .collect();
            let traitor_payoffs: f64 = traitors.iter().map(|bidder| payoffs[bidder]).sum();
            let traitor_payments: f64 = traitors.iter().map(|bidder| payments[bidder]).sum();

            let blocking = coalition.total_value() / unit - traitor_payoffs;
            let total_payment: f64 = payments.values().sum();
            event!(
                Level::DEBUG,
                iteration,
                blocking,
                total_payment,
                traitors = traitors.len(),
                "blocking coalition found"
            );

            let cycling = previous_blocking == Some(blocking);
            previous_blocking = Some(blocking);
            if blocking <= total_payment + CORE_TOLERANCE || cycling {
                if cycling {
                    event!(Level::DEBUG, iteration, "blocking value repeated, stopping");
                }
                let payment = Payment::new(payments).scaled(unit);
                return Ok(self.finish(allocation, payment, iteration));
            }

            let mut cut = Constraint::new(Comparison::Geq, blocking - traitor_payments);
            for (bidder, &var) in &variables {
                if !traitors.contains(bidder) {
                    cut.add_term(1.0, var);
                }
            }
            if cut.is_empty() {
                // only traitors are paying; the next iteration repeats this one
                continue;
            }
            core.add_constraint(cut);

            let minimal = self
                .solver
                .solve(&core, time_limit)
                .map_err(MechanismError::solver("minimal core payments"))?;
            warn_if_time_limited(&minimal, "minimal core payments");
            let total: f64 = variables
                .values()
                .map(|&var| clamp_to_bounds(&core, var, minimal.value(var)))
                .sum();
            let window = FIX_TOLERANCE * total.abs().max(1.0);

            let mut closest = core.clone();
            closest.clear_objective();
            let mut at_most = Constraint::new(Comparison::Leq, total + window);
            let mut at_least = Constraint::new(Comparison::Geq, total - window);
            for (bidder, &var) in &variables {
                at_most.add_term(1.0, var);
                at_least.add_term(1.0, var);
                // (p - vcg)^2 without its constant
                closest.add_quadratic_term(1.0, var, var);
                closest.add_objective_term(-2.0 * vcg_payments[bidder], var);
            }
            closest.add_constraint(at_most);
            closest.add_constraint(at_least);

            let solution = self
                .solver
                .solve(&closest, time_limit)
                .map_err(MechanismError::solver("closest core payments"))?;
            warn_if_time_limited(&solution, "closest core payments");
            payments = variables
                .iter()
                .map(|(&bidder, &var)| {
                    (bidder, clamp_to_bounds(&core, var, solution.value(var)))
                })
                .collect();
        }
    }

    fn finish(
        &self,
        allocation: Allocation,
        payment: Payment,
        iterations: usize,
    ) -> MechanismResult {
        let tolerance = CORE_TOLERANCE * allocation.total_value().max(1.0);
        let result = MechanismResult {
            payment,
            allocation,
        };
        for bidder in result.overcharged(tolerance) {
            event!(
                Level::WARN,
                %bidder,
                value = result.allocation.trade_value(bidder),
                payment = result.payment.payment_of(bidder),
                "payment exceeds the trade value"
            );
        }
        event!(
            Level::INFO,
            iterations,
            total_value = result.allocation.total_value(),
            total_payment = result.payment.total(),
            "core payments computed"
        );
        result
    }
}

// Interior point solutions may overshoot a bound by the solver tolerance
fn clamp_to_bounds(program: &Program, var: VarId, value: f64) -> f64 {
    let variable = &program.variables()[var.index()];
    value.clamp(variable.lower, variable.upper)
}

fn warn_if_time_limited(solution: &Solution, context: &'static str) {
    if solution.status == SolveStatus::TimeLimited {
        event!(
            Level::WARN,
            context,
            objective = solution.objective,
            "payment program hit its time limit, using the last iterate"
        );
    }
}

impl<S: MipSolver> AuctionMechanism for CcgMechanism<S> {
    fn mechanism_result(&self) -> Result<&MechanismResult, MechanismError> {
        if let Some(result) = self.result.get() {
            return Ok(result);
        }
        let result = self.calculate()?;
        Ok(self.result.get_or_init(|| result))
    }
}
