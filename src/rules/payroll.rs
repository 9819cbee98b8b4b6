//! Monthly salary computation.
//!
//! Components are prorated by `paid_days / working_days`; overtime is paid on
//! the hourly basic rate at a fixed multiplier; PF, ESI, PT and TDS are flat
//! statutory deductions.

use serde::Serialize;

use super::round2;
use crate::structs::payroll::SalaryStructure;

pub const PF_RATE: f64 = 0.12;
pub const ESI_RATE: f64 = 0.0075;
pub const EMPLOYER_ESI_RATE: f64 = 0.0325;
pub const ESI_WAGE_CEILING: f64 = 21_000.0;
pub const OVERTIME_MULTIPLIER: f64 = 2.0;
pub const STANDARD_HOURS_PER_DAY: f64 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PayrollInputs {
    pub working_days: f64,
    pub lop_days: f64,
    pub overtime_hours: f64,
    pub bonus: f64,
    pub other_deductions: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Payslip {
    pub working_days: f64,
    pub lop_days: f64,
    pub paid_days: f64,
    pub basic: f64,
    pub hra: f64,
    pub conveyance: f64,
    pub medical_allowance: f64,
    pub special_allowance: f64,
    pub overtime_hours: f64,
    pub overtime_pay: f64,
    pub bonus: f64,
    pub gross: f64,
    pub pf: f64,
    pub esi: f64,
    pub pt: f64,
    pub tds: f64,
    pub other_deductions: f64,
    pub total_deductions: f64,
    pub net: f64,
}

#[cfg(test)]
impl Payslip {
    pub fn statutory_deductions(&self) -> f64 {
        round2(self.pf + self.esi + self.pt + self.tds)
    }
}

/// Monthly professional tax slab.
pub fn professional_tax(gross: f64) -> f64 {
    if gross > 15_000.0 {
        200.0
    } else if gross > 10_000.0 {
        150.0
    } else {
        0.0
    }
}

pub fn compute(structure: &SalaryStructure, inputs: &PayrollInputs) -> Payslip {
    let working_days = inputs.working_days.max(0.0);
    let lop_days = inputs.lop_days.clamp(0.0, working_days);
    let paid_days = working_days - lop_days;
    let ratio = if working_days > 0.0 {
        paid_days / working_days
    } else {
        0.0
    };

    let basic = round2(structure.basic * ratio);
    let hra = round2(structure.hra * ratio);
    let conveyance = round2(structure.conveyance * ratio);
    let medical_allowance = round2(structure.medical_allowance * ratio);
    let special_allowance = round2(structure.special_allowance * ratio);

    let overtime_hours = if structure.overtime_enabled {
        inputs.overtime_hours.max(0.0)
    } else {
        0.0
    };
    let overtime_pay = if working_days > 0.0 {
        let hourly = structure.basic / (working_days * STANDARD_HOURS_PER_DAY);
        round2(overtime_hours * hourly * OVERTIME_MULTIPLIER)
    } else {
        0.0
    };
    let bonus = round2(inputs.bonus.max(0.0));

    let gross = round2(
        basic + hra + conveyance + medical_allowance + special_allowance + overtime_pay + bonus,
    );

    let pf = if structure.pf_enabled {
        round2(basic * PF_RATE)
    } else {
        0.0
    };
    let esi = if structure.esi_enabled && gross <= ESI_WAGE_CEILING {
        round2(gross * ESI_RATE)
    } else {
        0.0
    };
    let pt = if structure.pt_enabled {
        professional_tax(gross)
    } else {
        0.0
    };
    let tds = round2(gross * structure.tds_percent / 100.0);
    let other_deductions = round2(inputs.other_deductions.max(0.0));
    let total_deductions = round2(pf + esi + pt + tds + other_deductions);

    Payslip {
        working_days,
        lop_days,
        paid_days,
        basic,
        hra,
        conveyance,
        medical_allowance,
        special_allowance,
        overtime_hours,
        overtime_pay,
        bonus,
        gross,
        pf,
        esi,
        pt,
        tds,
        other_deductions,
        total_deductions,
        net: round2(gross - total_deductions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn structure() -> SalaryStructure {
        SalaryStructure {
            id: 1,
            employee_id: 1,
            basic: 30_000.0,
            hra: 12_000.0,
            conveyance: 1_600.0,
            medical_allowance: 1_250.0,
            special_allowance: 5_150.0,
            pf_enabled: true,
            esi_enabled: true,
            pt_enabled: true,
            tds_percent: 5.0,
            overtime_enabled: true,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_month_without_lop() {
        let slip = compute(
            &structure(),
            &PayrollInputs {
                working_days: 30.0,
                overtime_hours: 4.0,
                ..PayrollInputs::default()
            },
        );
        // 30000 / (30 * 8) = 125 per hour, doubled.
        assert_eq!(slip.overtime_pay, 1_000.0);
        let components = slip.basic + slip.hra + slip.conveyance + slip.medical_allowance
            + slip.special_allowance;
        assert!((slip.gross - (components + slip.overtime_pay)).abs() < 0.01);
        assert_eq!(slip.gross, 51_000.0);
        assert_eq!(slip.pf, 3_600.0);
        assert_eq!(slip.esi, 0.0, "above the ESI wage ceiling");
        assert_eq!(slip.pt, 200.0);
        assert_eq!(slip.tds, 2_550.0);
        assert!((slip.net - (slip.gross - slip.statutory_deductions())).abs() < 0.01);
    }

    #[test]
    fn lop_prorates_every_component() {
        let slip = compute(
            &structure(),
            &PayrollInputs {
                working_days: 30.0,
                lop_days: 3.0,
                ..PayrollInputs::default()
            },
        );
        assert_eq!(slip.paid_days, 27.0);
        assert_eq!(slip.basic, 27_000.0);
        assert_eq!(slip.hra, 10_800.0);
        assert_eq!(slip.pf, 3_240.0);
    }

    #[test]
    fn esi_applies_below_ceiling_and_pt_follows_slabs() {
        let mut low = structure();
        low.basic = 9_000.0;
        low.hra = 3_000.0;
        low.conveyance = 0.0;
        low.medical_allowance = 0.0;
        low.special_allowance = 0.0;
        low.tds_percent = 0.0;
        let slip = compute(&low, &PayrollInputs { working_days: 30.0, ..Default::default() });
        assert_eq!(slip.gross, 12_000.0);
        assert_eq!(slip.esi, 90.0);
        assert_eq!(slip.pt, 150.0);
        assert_eq!(professional_tax(9_999.0), 0.0);
    }

    #[test]
    fn lop_cannot_exceed_working_days_and_adjustments_apply() {
        let slip = compute(
            &structure(),
            &PayrollInputs {
                working_days: 30.0,
                lop_days: 45.0,
                bonus: 500.0,
                other_deductions: 100.0,
                ..PayrollInputs::default()
            },
        );
        assert_eq!(slip.paid_days, 0.0);
        assert_eq!(slip.basic, 0.0);
        assert_eq!(slip.gross, 500.0);
        assert_eq!(slip.other_deductions, 100.0);
    }
}
