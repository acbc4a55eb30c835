use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use super::locks::PayslipLocks;
use super::tax_tables::TaxTableProvider;
use crate::calculations::common::{checked_add, checked_sub, checked_sum, round_half_up};
use crate::calculations::{WithholdingCalculator, WithholdingConfig};
use crate::db::PayrollRepository;
use crate::error::{PayrollError, PayrollResult};
use crate::models::{
    DerivedTotals, LineItem, LineItemDetail, LineItemKind, NewLineItem, Payslip, TaxBracketTable,
    TaxKind,
};

/// Dependents are not tracked per employee yet; IRRF always uses zero.
const DEPENDENTS: u32 = 0;

/// Sums of a payslip's line items before withholding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PayslipBases {
    pub total_earnings: Decimal,
    /// Explicit deduction line items only, without INSS or IRRF.
    pub item_deductions: Decimal,
    pub inss_base: Decimal,
    pub irrf_base: Decimal,
}

impl PayslipBases {
    /// Folds line items into earnings, deductions and the two taxable bases.
    ///
    /// # Errors
    /// [`PayrollError::Validation`] when any amount is negative or a sum
    /// leaves the representable range.
    pub fn accumulate(items: &[LineItemDetail]) -> PayrollResult<Self> {
        let mut bases = Self::default();
        for LineItemDetail { item, kind } in items {
            bases.add(kind, item.amount)?;
        }
        Ok(bases)
    }

    /// Adds one amount under `kind`'s classification and base flags.
    pub fn add(
        &mut self,
        kind: &LineItemKind,
        amount: Decimal,
    ) -> PayrollResult<()> {
        validate_amount(amount)?;
        if kind.is_earning() {
            self.total_earnings = checked_add(self.total_earnings, amount, "summing earnings")?;
            if kind.contributes_to_inss() {
                self.inss_base = checked_add(self.inss_base, amount, "summing the INSS base")?;
            }
            if kind.contributes_to_irrf() {
                self.irrf_base = checked_add(self.irrf_base, amount, "summing the IRRF base")?;
            }
        } else {
            self.item_deductions =
                checked_add(self.item_deductions, amount, "summing deductions")?;
        }
        Ok(())
    }
}

/// A mutation whose effect on the totals is settled before it is stored.
#[derive(Clone, Copy)]
enum PendingChange<'a> {
    Nothing,
    Add {
        kind: &'a LineItemKind,
        amount: Decimal,
    },
    Remove(i64),
}

fn validate_amount(amount: Decimal) -> PayrollResult<()> {
    if amount < Decimal::ZERO {
        return Err(PayrollError::Validation(format!(
            "line item amount must not be negative, got {amount}"
        )));
    }
    Ok(())
}

/// Keeps every payslip's derived totals consistent with its line items.
///
/// All mutations of a payslip go through here and are serialised per
/// payslip id.
pub struct PayslipEngine {
    repo: Arc<dyn PayrollRepository>,
    tables: TaxTableProvider,
    calculator: WithholdingCalculator,
    locks: PayslipLocks,
}

impl PayslipEngine {
    pub fn new(
        repo: Arc<dyn PayrollRepository>,
        tables: TaxTableProvider,
        config: WithholdingConfig,
    ) -> PayrollResult<Self> {
        Ok(Self {
            repo,
            tables,
            calculator: WithholdingCalculator::new(config)?,
            locks: PayslipLocks::default(),
        })
    }

    /// Engine over `repo` with the statutory ceiling and dependent deduction.
    pub fn with_defaults(repo: Arc<dyn PayrollRepository>) -> Self {
        Self {
            tables: TaxTableProvider::new(Arc::clone(&repo)),
            repo,
            calculator: WithholdingCalculator::default(),
            locks: PayslipLocks::default(),
        }
    }

    pub fn tables(&self) -> &TaxTableProvider {
        &self.tables
    }

    pub fn calculator(&self) -> &WithholdingCalculator {
        &self.calculator
    }

    /// Re-derives and persists the totals of `payslip_id` from its current
    /// line items. Running it twice without intervening changes writes the
    /// same values.
    ///
    /// On any error nothing is written and the previous totals stay.
    #[instrument(skip(self))]
    pub async fn recompute(
        &self,
        payslip_id: i64,
    ) -> PayrollResult<DerivedTotals> {
        let _guard = self.locks.acquire(payslip_id).await;
        let payslip = self.load_payslip(payslip_id).await?;
        self.recompute_locked(&payslip).await
    }

    /// Adds a line item to an open payslip and recomputes it.
    ///
    /// The new totals, tax tables included, are derived before the item is
    /// stored; when that fails the payslip is left exactly as it was.
    #[instrument(skip(self, item), fields(kind_id = item.kind_id))]
    pub async fn add_line_item(
        &self,
        payslip_id: i64,
        item: NewLineItem,
    ) -> PayrollResult<(LineItem, DerivedTotals)> {
        validate_amount(item.amount)?;

        let _guard = self.locks.acquire(payslip_id).await;
        let payslip = self.load_payslip(payslip_id).await?;
        self.ensure_open(payslip.payroll_run_id).await?;
        let kind = self
            .repo
            .get_line_item_kind(item.kind_id)
            .await
            .map_err(PayrollError::not_found("line item kind", item.kind_id))?;

        let pending = PendingChange::Add {
            kind: &kind,
            amount: item.amount,
        };
        let (items, totals) = self.derive(&payslip, pending).await?;

        let created = self
            .repo
            .add_line_item(payslip_id, item)
            .await
            .map_err(PayrollError::not_found("payslip", payslip_id))?;
        debug!(line_item_id = created.id, amount = %created.amount, "line item added");

        let totals = self.store_totals(&payslip, items, totals).await?;
        Ok((created, totals))
    }

    /// Removes a line item from an open payslip and recomputes its owner.
    ///
    /// Like [`PayslipEngine::add_line_item`], nothing is deleted unless the
    /// remaining items can be recomputed.
    #[instrument(skip(self))]
    pub async fn remove_line_item(
        &self,
        line_item_id: i64,
    ) -> PayrollResult<DerivedTotals> {
        let item = self.load_line_item(line_item_id).await?;

        let _guard = self.locks.acquire(item.payslip_id).await;
        let payslip = self.load_payslip(item.payslip_id).await?;
        self.ensure_open(payslip.payroll_run_id).await?;
        let (items, totals) = self
            .derive(&payslip, PendingChange::Remove(line_item_id))
            .await?;

        self.repo
            .delete_line_item(line_item_id)
            .await
            .map_err(PayrollError::not_found("line item", line_item_id))?;
        debug!(payslip_id = payslip.id, "line item removed");

        self.store_totals(&payslip, items, totals).await
    }

    async fn recompute_locked(
        &self,
        payslip: &Payslip,
    ) -> PayrollResult<DerivedTotals> {
        let (items, totals) = self.derive(payslip, PendingChange::Nothing).await?;
        self.store_totals(payslip, items, totals).await
    }

    /// Totals of `payslip` once `change` is applied, plus the resulting item
    /// count. Reads only; the caller holds the payslip lock.
    async fn derive(
        &self,
        payslip: &Payslip,
        change: PendingChange<'_>,
    ) -> PayrollResult<(usize, DerivedTotals)> {
        let run = self
            .repo
            .get_payroll_run(payslip.payroll_run_id)
            .await
            .map_err(PayrollError::not_found("payroll run", payslip.payroll_run_id))?;
        let period = self
            .repo
            .get_pay_period(run.pay_period_id)
            .await
            .map_err(PayrollError::not_found("pay period", run.pay_period_id))?;

        let mut items = self.repo.list_line_items(payslip.id).await?;
        if let PendingChange::Remove(line_item_id) = change {
            items.retain(|detail| detail.item.id != line_item_id);
        }
        let mut bases = PayslipBases::accumulate(&items)?;
        let mut count = items.len();
        if let PendingChange::Add { kind, amount } = change {
            bases.add(kind, amount)?;
            count += 1;
        }

        let inss_table = self.tables.resolve_table(TaxKind::Inss, period.year).await?;
        let irrf_table = self.tables.resolve_table(TaxKind::Irrf, period.year).await?;
        let totals = self.derive_totals(&bases, &inss_table, &irrf_table)?;
        Ok((count, totals))
    }

    async fn store_totals(
        &self,
        payslip: &Payslip,
        items: usize,
        totals: DerivedTotals,
    ) -> PayrollResult<DerivedTotals> {
        self.repo
            .update_payslip_totals(payslip.id, &totals)
            .await
            .map_err(PayrollError::not_found("payslip", payslip.id))?;

        info!(
            payslip_id = payslip.id,
            items,
            gross = %totals.gross_pay,
            inss = %totals.inss_withheld,
            irrf = %totals.irrf_withheld,
            net = %totals.net_pay,
            "payslip recomputed"
        );
        Ok(totals)
    }

    /// Applies withholding to `bases`. Pure; touches no storage.
    ///
    /// # Errors
    /// [`PayrollError::Validation`] when an amount leaves the representable
    /// range.
    pub fn derive_totals(
        &self,
        bases: &PayslipBases,
        inss_table: &TaxBracketTable,
        irrf_table: &TaxBracketTable,
    ) -> PayrollResult<DerivedTotals> {
        let inss_withheld = self.calculator.inss(bases.inss_base, inss_table)?;
        let irrf_withheld = self.calculator.irrf(bases.irrf_base, DEPENDENTS, irrf_table)?;
        let total_deductions = checked_sum(
            [bases.item_deductions, inss_withheld, irrf_withheld],
            "summing deductions",
        )?;
        let net_pay = checked_sub(bases.total_earnings, total_deductions, "computing net pay")?;

        Ok(DerivedTotals {
            gross_pay: bases.total_earnings,
            total_earnings: bases.total_earnings,
            total_deductions,
            inss_base: bases.inss_base,
            inss_withheld,
            irrf_base: bases.irrf_base,
            irrf_withheld,
            net_pay: round_half_up(net_pay),
        })
    }

    async fn load_payslip(
        &self,
        payslip_id: i64,
    ) -> PayrollResult<Payslip> {
        self.repo
            .get_payslip(payslip_id)
            .await
            .map_err(PayrollError::not_found("payslip", payslip_id))
    }

    async fn load_line_item(
        &self,
        line_item_id: i64,
    ) -> PayrollResult<LineItem> {
        self.repo
            .get_line_item(line_item_id)
            .await
            .map_err(PayrollError::not_found("line item", line_item_id))
    }

    async fn ensure_open(
        &self,
        payroll_run_id: i64,
    ) -> PayrollResult<()> {
        let run = self
            .repo
            .get_payroll_run(payroll_run_id)
            .await
            .map_err(PayrollError::not_found("payroll run", payroll_run_id))?;
        if run.closed {
            return Err(PayrollError::RunClosed(run.id));
        }
        Ok(())
    }
}
