//! 实验结果.

use crate::estimators::Profile;
use std::io::{self, Write};

/// 将 `p` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Estimator `{name}`:")?;
    writeln!(w, "{S4}Measured phantoms: {}", p.get_measured())?;
    writeln!(w, "{S4}Failed phantoms: {}", p.get_failed())?;
    writeln!(
        w,
        "{S4}Mean relative surface error: {}",
        f64_to_display(p.get_mean_rel_error())
    )?;
    writeln!(
        w,
        "{S4}Mean absolute relative surface error: {}",
        f64_to_display(p.get_mean_abs_rel_error())
    )?;
    writeln!(
        w,
        "{S4}Mean sphericity: {}",
        f64_to_display(p.get_mean_sphericity())
    )?;
    writeln!(w, "{S4}Effective total time: {} us", p.get_measure_time_us())?;
    writeln!(
        w,
        "{S4}Effective average time: {} us",
        f64_to_display(p.get_avg_measure_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros() as f64);
    write!(w, "{S4}Most time-consuming phantom costs {} us", f64_to_display(t))?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 输出运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        utils::sep_to(&mut out)?;
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut out)?;
            writeln!(out)?;
            utils::sep_to(&mut out)?;
        }
        Ok(())
    }
}
