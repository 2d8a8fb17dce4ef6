use rand::Rng;
use serde::Serialize;
use statlab_stats::inference::{
    self, AnovaResult, ChiSquareResult, ConfidenceInterval, ContingencyTable, DistributionParams,
    EffectSize, ZTestResult,
};
use statlab_synth::{
    cohorts::{self, HierarchicalParams},
    normal,
};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InferenceArg {
    /// Observations per sample
    #[arg(long, default_value_t = 30)]
    size: usize,
    /// Population mean of sample A
    #[arg(long, default_value_t = 70.0, allow_negative_numbers = true)]
    mean_a: f64,
    /// Population mean of sample B
    #[arg(long, default_value_t = 75.0, allow_negative_numbers = true)]
    mean_b: f64,
    /// Population standard deviation of both samples
    #[arg(long, default_value_t = 10.0)]
    std_dev: f64,
    /// Reference mean for the one-sample z-test of A
    #[arg(long, default_value_t = 70.0, allow_negative_numbers = true)]
    population_mean: f64,
    /// Confidence level of the reported intervals
    #[arg(long, default_value_t = 0.95)]
    confidence: f64,
    /// Score at or above which an observation counts as a pass
    #[arg(long, default_value_t = 70.0, allow_negative_numbers = true)]
    pass_mark: f64,
    /// Number of groups in the ANOVA dataset
    #[arg(long, default_value_t = 4)]
    groups: usize,
}

#[derive(Debug, Serialize)]
struct SampleSummary {
    params: DistributionParams,
    confidence_interval: ConfidenceInterval,
    pass_rate: ConfidenceInterval,
}

#[derive(Debug, Serialize)]
struct InferenceReport {
    sample_a: SampleSummary,
    sample_b: SampleSummary,
    one_sample_z: ZTestResult,
    two_sample_z: ZTestResult,
    effect_size: EffectSize,
    pass_table: ContingencyTable,
    chi_square: ChiSquareResult,
    anova: AnovaResult,
}

pub(crate) fn run(arg: &InferenceArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("inference", report)
}

fn analyze<R>(arg: &InferenceArg, rng: &mut R) -> anyhow::Result<InferenceReport>
where
    R: Rng + ?Sized,
{
    let a = draw_sample(arg, arg.mean_a, rng)?;
    let b = draw_sample(arg, arg.mean_b, rng)?;

    let passes = |values: &[f64]| {
        let passed = values.iter().filter(|&&v| v >= arg.pass_mark).count() as u64;
        (passed, values.len() as u64 - passed)
    };
    let (a_pass, a_fail) = passes(&a);
    let (b_pass, b_fail) = passes(&b);
    let pass_table = ContingencyTable::new(vec![vec![a_pass, a_fail], vec![b_pass, b_fail]])?;

    let summary = |values: &[f64], passed: u64| -> anyhow::Result<SampleSummary> {
        Ok(SampleSummary {
            params: DistributionParams::from_values(values)?,
            confidence_interval: inference::confidence_interval(values, arg.confidence)?,
            pass_rate: inference::proportion_confidence_interval(
                passed,
                values.len() as u64,
                arg.confidence,
            )?,
        })
    };
    let sample_a = summary(&a, a_pass)?;
    let sample_b = summary(&b, b_pass)?;

    let hierarchical = cohorts::hierarchical(
        &HierarchicalParams {
            groups: arg.groups,
            ..HierarchicalParams::default()
        },
        rng,
    )?;
    let anova = inference::anova(&cohorts::group_values(&hierarchical))?;

    Ok(InferenceReport {
        one_sample_z: inference::one_sample_z_test(&sample_a.params, arg.population_mean)?,
        two_sample_z: inference::two_sample_z_test(&sample_a.params, &sample_b.params)?,
        effect_size: inference::effect_size(&sample_a.params, &sample_b.params)?,
        chi_square: inference::chi_square_test(&pass_table),
        pass_table,
        anova,
        sample_a,
        sample_b,
    })
}

fn draw_sample<R>(arg: &InferenceArg, mean: f64, rng: &mut R) -> anyhow::Result<Vec<f64>>
where
    R: Rng + ?Sized,
{
    let params = DistributionParams {
        mean,
        std_dev: arg.std_dev,
        size: arg.size,
    };
    Ok(normal::sample_distribution(&params, rng)?)
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> InferenceArg {
        InferenceArg {
            size: 30,
            mean_a: 70.0,
            mean_b: 75.0,
            std_dev: 10.0,
            population_mean: 70.0,
            confidence: 0.95,
            pass_mark: 70.0,
            groups: 4,
        }
    }

    #[test]
    fn test_inference_report_is_consistent() {
        let report = analyze(&arg(), &mut seeded_rng(3)).unwrap();
        assert_eq!(report.pass_table.grand_total(), 60);
        assert_eq!(report.chi_square.degrees_of_freedom, 1);
        assert_eq!(report.anova.df_between, 3);
        assert_eq!(report.anova.df_within, 96);
        for sample in [&report.sample_a, &report.sample_b] {
            assert!(sample.confidence_interval.contains(sample.params.mean));
            assert!((0.0..=1.0).contains(&sample.pass_rate.lower));
            assert!((0.0..=1.0).contains(&sample.pass_rate.upper));
        }
        assert_eq!(
            report.effect_size.t_statistic.signum(),
            report.two_sample_z.z.signum()
        );
    }

    #[test]
    fn test_large_gap_is_significant() {
        let arg = InferenceArg {
            size: 100,
            mean_b: 90.0,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(4)).unwrap();
        assert!(report.two_sample_z.significant);
        assert!(report.effect_size.significant);
        assert!(report.effect_size.cohens_d > 1.0);
    }

    #[test]
    fn test_single_group_anova_is_rejected() {
        let arg = InferenceArg { groups: 1, ..arg() };
        assert!(analyze(&arg, &mut seeded_rng(5)).is_err());
    }
}
