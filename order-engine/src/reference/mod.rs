//! In-memory reference data: portfolios, instruments, restricted list,
//! concentration verdicts and market history.
//!
//! Backs the binary and the tests. Updated through `upsert_*` calls.

use chrono::{DateTime, Utc};
use oms::{
    CollaboratorError, ComplianceProvider, ConcentrationVerdict, InstrumentId, InstrumentLookup,
    InstrumentSnapshot, MarketBar, MarketDataProvider, Order, PortfolioId, PortfolioLookup,
    PortfolioSnapshot, TenantId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    portfolios: HashMap<(TenantId, PortfolioId), PortfolioSnapshot>,
    instruments: HashMap<InstrumentId, InstrumentSnapshot>,
    restricted: HashSet<(TenantId, InstrumentId)>,
    concentration: HashMap<(TenantId, InstrumentId), ConcentrationVerdict>,
    bars: HashMap<InstrumentId, Vec<MarketBar>>,
}

#[derive(Default)]
pub struct ReferenceData {
    tables: RwLock<Tables>,
}

impl ReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_portfolio(&self, portfolio: PortfolioSnapshot) -> Result<(), CollaboratorError> {
        let key = (portfolio.tenant_id.clone(), portfolio.id.clone());
        self.write()?.portfolios.insert(key, portfolio);
        Ok(())
    }

    pub fn upsert_instrument(&self, instrument: InstrumentSnapshot) -> Result<(), CollaboratorError> {
        self.write()?
            .instruments
            .insert(instrument.id.clone(), instrument);
        Ok(())
    }

    pub fn restrict(&self, tenant_id: TenantId, instrument_id: InstrumentId) -> Result<(), CollaboratorError> {
        self.write()?.restricted.insert((tenant_id, instrument_id));
        Ok(())
    }

    /// Verdict returned for every order of `tenant_id` in `instrument_id`.
    pub fn set_concentration_verdict(
        &self,
        tenant_id: TenantId,
        instrument_id: InstrumentId,
        verdict: ConcentrationVerdict,
    ) -> Result<(), CollaboratorError> {
        self.write()?
            .concentration
            .insert((tenant_id, instrument_id), verdict);
        Ok(())
    }

    /// Appends bars, keeping each instrument's history sorted by time.
    pub fn add_bars(&self, bars: Vec<MarketBar>) -> Result<(), CollaboratorError> {
        let mut tables = self.write()?;
        for bar in bars {
            tables
                .bars
                .entry(bar.instrument_id.clone())
                .or_default()
                .push(bar);
        }
        for history in tables.bars.values_mut() {
            history.sort_by_key(|b| b.timestamp);
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, CollaboratorError> {
        self.tables
            .read()
            .map_err(|_| CollaboratorError::Unavailable("reference data lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, CollaboratorError> {
        self.tables
            .write()
            .map_err(|_| CollaboratorError::Unavailable("reference data lock poisoned".to_string()))
    }
}

impl PortfolioLookup for ReferenceData {
    fn portfolio(
        &self,
        id: &PortfolioId,
        tenant_id: &TenantId,
    ) -> Result<Option<PortfolioSnapshot>, CollaboratorError> {
        Ok(self
            .read()?
            .portfolios
            .get(&(tenant_id.clone(), id.clone()))
            .cloned())
    }
}

impl InstrumentLookup for ReferenceData {
    fn instrument(
        &self,
        id: &InstrumentId,
        _tenant_id: &TenantId,
    ) -> Result<Option<InstrumentSnapshot>, CollaboratorError> {
        Ok(self.read()?.instruments.get(id).cloned())
    }
}

impl ComplianceProvider for ReferenceData {
    fn is_restricted(
        &self,
        tenant_id: &TenantId,
        instrument_id: &InstrumentId,
    ) -> Result<bool, CollaboratorError> {
        Ok(self
            .read()?
            .restricted
            .contains(&(tenant_id.clone(), instrument_id.clone())))
    }

    fn check_concentration(&self, order: &Order) -> Result<ConcentrationVerdict, CollaboratorError> {
        Ok(self
            .read()?
            .concentration
            .get(&(order.tenant_id().clone(), order.instrument_id().clone()))
            .cloned()
            .unwrap_or_else(ConcentrationVerdict::pass))
    }
}

impl MarketDataProvider for ReferenceData {
    fn bars(
        &self,
        instrument_id: &InstrumentId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MarketBar>, CollaboratorError> {
        Ok(self
            .read()?
            .bars
            .get(instrument_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|b| b.timestamp >= from && b.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
