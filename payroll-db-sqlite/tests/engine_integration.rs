//! End-to-end checks of the engine against a seeded in-memory SQLite store.

use std::sync::Arc;

use payroll_core::calculations::WithholdingConfig;
use payroll_core::db::{DbConfig, RepositoryFactory};
use payroll_core::{
    Bracket, DerivedTotals, NewEmployee, NewLineItem, PayrollError, PayrollRepository,
    PayrollRunGenerator, PayslipEngine, TaxBracketTable, TaxKind, TaxTableProvider,
};
use payroll_db_sqlite::SqliteRepositoryFactory;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Harness {
    repo: Arc<dyn PayrollRepository>,
    engine: Arc<PayslipEngine>,
    generator: PayrollRunGenerator,
}

async fn harness() -> Harness {
    let repo: Arc<dyn PayrollRepository> = SqliteRepositoryFactory
        .create(&DbConfig::default())
        .await
        .expect("in-memory repository")
        .into();
    let tables = TaxTableProvider::new(Arc::clone(&repo));
    let engine = Arc::new(
        PayslipEngine::new(Arc::clone(&repo), tables, WithholdingConfig::default())
            .expect("default config is valid"),
    );
    let generator = PayrollRunGenerator::new(Arc::clone(&repo), Arc::clone(&engine));
    Harness {
        repo,
        engine,
        generator,
    }
}

async fn hire(
    repo: &Arc<dyn PayrollRepository>,
    name: &str,
    salary: Decimal,
) -> i64 {
    repo.create_employee(NewEmployee {
        name: name.to_string(),
        tax_id: None,
        salary,
    })
    .await
    .expect("employee")
    .id
}

async fn kind_id(
    repo: &Arc<dyn PayrollRepository>,
    code: &str,
) -> i64 {
    repo.get_line_item_kind_by_code(code)
        .await
        .expect("seeded kind")
        .id
}

#[tokio::test]
async fn generated_payslip_matches_worked_example() {
    let h = harness().await;
    let ana = hire(&h.repo, "Ana", dec!(3000)).await;
    let period = h.generator.create_pay_period(2025, 3).await.unwrap();

    let summary = h.generator.generate(period.id).await.unwrap();

    assert_eq!(summary.created.len(), 1);
    assert_eq!(summary.created[0].employee_id, ana);
    let stored = h
        .repo
        .get_payslip(summary.created[0].payslip_id)
        .await
        .unwrap();
    assert_eq!(
        stored.totals,
        DerivedTotals {
            gross_pay: dec!(3000),
            total_earnings: dec!(3000),
            total_deductions: dec!(338.42),
            inss_base: dec!(3000),
            inss_withheld: dec!(258.82),
            irrf_base: dec!(3000),
            irrf_withheld: dec!(79.60),
            net_pay: dec!(2661.58),
        }
    );
}

#[tokio::test]
async fn salary_above_ceiling_pays_capped_inss() {
    let h = harness().await;
    hire(&h.repo, "Bia", dec!(10000)).await;
    let period = h.generator.create_pay_period(2025, 4).await.unwrap();

    let summary = h.generator.generate(period.id).await.unwrap();

    let totals = &summary.created[0].totals;
    assert_eq!(totals.inss_withheld, dec!(908.86));
    assert_eq!(totals.irrf_withheld, dec!(1865.04));
    assert_eq!(totals.net_pay, dec!(7226.10));
}

#[tokio::test]
async fn year_without_tables_falls_back_to_2025() {
    let h = harness().await;
    hire(&h.repo, "Caio", dec!(3000)).await;
    let period = h.generator.create_pay_period(2027, 1).await.unwrap();

    let summary = h.generator.generate(period.id).await.unwrap();

    assert_eq!(summary.created[0].totals.inss_withheld, dec!(258.82));
    assert_eq!(summary.created[0].totals.irrf_withheld, dec!(79.60));
}

#[tokio::test]
async fn newer_table_applies_to_its_year_only() {
    let h = harness().await;
    h.repo
        .insert_tax_table(&TaxBracketTable::new(
            2026,
            TaxKind::Irrf,
            vec![
                Bracket::new(dec!(5000), dec!(0), dec!(0)),
                Bracket::new(dec!(999999), dec!(27.5), dec!(908.73)),
            ],
        ))
        .await
        .unwrap();
    hire(&h.repo, "Davi", dec!(3000)).await;
    let p2025 = h.generator.create_pay_period(2025, 12).await.unwrap();
    let p2026 = h.generator.create_pay_period(2026, 1).await.unwrap();

    let old = h.generator.generate(p2025.id).await.unwrap();
    let new = h.generator.generate(p2026.id).await.unwrap();

    assert_eq!(old.created[0].totals.irrf_withheld, dec!(79.60));
    assert_eq!(new.created[0].totals.irrf_withheld, Decimal::ZERO);
    assert_eq!(new.created[0].totals.inss_withheld, dec!(258.82));
}

#[tokio::test]
async fn line_item_changes_are_reflected_after_each_mutation() {
    let h = harness().await;
    hire(&h.repo, "Eva", dec!(3000)).await;
    let period = h.generator.create_pay_period(2025, 5).await.unwrap();
    let summary = h.generator.generate(period.id).await.unwrap();
    let payslip_id = summary.created[0].payslip_id;
    let overtime = kind_id(&h.repo, "HE").await;
    let health = kind_id(&h.repo, "SAUDE").await;

    let (extra, with_overtime) = h
        .engine
        .add_line_item(
            payslip_id,
            NewLineItem {
                kind_id: overtime,
                amount: dec!(500),
                reference: Some("10h".to_string()),
            },
        )
        .await
        .unwrap();
    let (_, with_health) = h
        .engine
        .add_line_item(
            payslip_id,
            NewLineItem {
                kind_id: health,
                amount: dec!(250),
                reference: None,
            },
        )
        .await
        .unwrap();
    let without_overtime = h.engine.remove_line_item(extra.id).await.unwrap();

    assert_eq!(with_overtime.total_earnings, dec!(3500));
    assert_eq!(with_overtime.inss_base, dec!(3500));
    assert_eq!(with_health.inss_base, dec!(3500));
    assert_eq!(
        with_health.total_deductions,
        dec!(250) + with_health.inss_withheld + with_health.irrf_withheld
    );
    assert_eq!(without_overtime.total_earnings, dec!(3000));
    assert_eq!(without_overtime.net_pay, dec!(2411.58));
    assert_eq!(
        h.repo.get_payslip(payslip_id).await.unwrap().totals,
        without_overtime
    );
}

#[tokio::test]
async fn recompute_twice_yields_identical_rows() {
    let h = harness().await;
    hire(&h.repo, "Fabio", dec!(4321.09)).await;
    let period = h.generator.create_pay_period(2025, 6).await.unwrap();
    let summary = h.generator.generate(period.id).await.unwrap();
    let payslip_id = summary.created[0].payslip_id;

    let first = h.engine.recompute(payslip_id).await.unwrap();
    let stored_first = h.repo.get_payslip(payslip_id).await.unwrap().totals;
    let second = h.engine.recompute(payslip_id).await.unwrap();
    let stored_second = h.repo.get_payslip(payslip_id).await.unwrap().totals;

    assert_eq!(first, second);
    assert_eq!(stored_first, stored_second);
}

#[tokio::test]
async fn closed_run_rejects_new_items() {
    let h = harness().await;
    hire(&h.repo, "Gil", dec!(2000)).await;
    let period = h.generator.create_pay_period(2025, 7).await.unwrap();
    let summary = h.generator.generate(period.id).await.unwrap();
    let bonus = kind_id(&h.repo, "BONUS").await;
    h.generator.close(summary.run.id).await.unwrap();

    let result = h
        .engine
        .add_line_item(
            summary.created[0].payslip_id,
            NewLineItem {
                kind_id: bonus,
                amount: dec!(100),
                reference: None,
            },
        )
        .await;

    assert_eq!(result, Err(PayrollError::RunClosed(summary.run.id)));
}

#[tokio::test]
async fn regeneration_skips_existing_payslips() {
    let h = harness().await;
    let first_hire = hire(&h.repo, "Hugo", dec!(1800)).await;
    let period = h.generator.create_pay_period(2025, 8).await.unwrap();
    h.generator.generate(period.id).await.unwrap();
    hire(&h.repo, "Iris", dec!(2200)).await;

    let again = h.generator.generate(period.id).await.unwrap();

    assert_eq!(again.skipped, vec![first_hire]);
    assert_eq!(again.created.len(), 1);
    assert_eq!(h.repo.list_payslips(again.run.id).await.unwrap().len(), 2);
}
