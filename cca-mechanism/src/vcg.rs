use crate::{AuctionMechanism, MechanismError, WinnerDetermination};
use cca_core::{
    models::{MechanismResult, Payment},
    ports::MipSolver,
};
use std::sync::OnceLock;
use tracing::{Level, event, span};

/// Vickrey-Clarke-Groves payments.
///
/// Every winner pays the externality it imposes on the others: the value the
/// others could achieve without it minus the value they achieve with it.
pub struct VcgMechanism<S> {
    wdp: WinnerDetermination,
    solver: S,
    result: OnceLock<MechanismResult>,
}

impl<S: MipSolver> VcgMechanism<S> {
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
        let span = span!(Level::INFO, "vcg", bidders = self.wdp.bids().len());
        let _guard = span.enter();

        let allocation = self.wdp.solve(&self.solver)?;
        let total = allocation.total_value();

        let mut payments = Vec::with_capacity(allocation.winners().len());
        for bidder in allocation.winners() {
            let value = allocation.trade_value(bidder);
            let without = self.wdp.without_bidder(bidder).solve(&self.solver)?;
            let payment = without.total_value() - (total - value);
            if payment > value {
                event!(
                    Level::WARN,
                    %bidder,
                    value,
                    payment,
                    total_without = without.total_value(),
                    scaling_factor = self.wdp.scaling_factor(),
                    "payment exceeds the trade value"
                );
            }
            payments.push((bidder, payment));
        }

        let payment = Payment::new(payments);
        event!(
            Level::INFO,
            total_value = total,
            total_payment = payment.total(),
            "vcg payments computed"
        );
        Ok(MechanismResult {
            payment,
            allocation,
        })
    }
}

impl<S: MipSolver> AuctionMechanism for VcgMechanism<S> {
    fn mechanism_result(&self) -> Result<&MechanismResult, MechanismError> {
        if let Some(result) = self.result.get() {
            return Ok(result);
        }
        let result = self.calculate()?;
        Ok(self.result.get_or_init(|| result))
    }
}
