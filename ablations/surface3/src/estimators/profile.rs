//! 估计方法运行统计.

use std::time::{Duration, Instant};

/// 可暂停的累计计时器.
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时即视为已经开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始 (或重新开始) 本轮计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束本轮计时并累加. 返回本轮时长.
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    #[inline]
    fn total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 单个表面积估计方法的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 测量失败的样本数.
    failed: u64,

    /// 测量成功的样本数.
    measured: u64,

    /// 测量成功样本的累计耗时.
    measure_time: AccTimer,

    /// 整个任务的自然时间.
    real_time: AccTimer,

    /// 单个样本最长耗时.
    most: Option<Duration>,

    /// 相对表面积误差 `(估计 − 解析) / 解析` 之和.
    rel_error: f64,

    /// 相对表面积误差绝对值之和.
    abs_rel_error: f64,

    /// 球形度之和.
    sphericity: f64,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            failed: 0,
            measured: 0,
            measure_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
            rel_error: 0.0,
            abs_rel_error: 0.0,
            sphericity: 0.0,
        }
    }

    /// 开始一次样本测量计时.
    #[inline]
    pub fn measure_start(&mut self) {
        self.measure_time.start();
    }

    /// 结束一次样本测量计时.
    #[inline]
    pub fn measure_elapsed(&mut self) {
        let d = self.measure_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录一次失败的测量.
    #[inline]
    pub fn count_failed(&mut self) {
        self.failed += 1;
    }

    /// 记录一次成功的测量.
    pub fn count_measured(&mut self, estimated: f64, truth: f64, sphericity: f64) {
        let rel = (estimated - truth) / truth;
        self.measured += 1;
        self.rel_error += rel;
        self.abs_rel_error += rel.abs();
        self.sphericity += sphericity;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 失败样本数.
    #[inline]
    pub fn get_failed(&self) -> u64 {
        self.failed
    }

    /// 成功样本数.
    #[inline]
    pub fn get_measured(&self) -> u64 {
        self.measured
    }

    /// 以微秒为单位获得测量成功样本的总耗时.
    #[inline]
    pub fn get_measure_time_us(&self) -> u64 {
        self.measure_time.total_us()
    }

    /// 以微秒为单位获得任务总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.total_us()
    }

    fn per_sample(&self, total: f64) -> Option<f64> {
        match self.measured {
            0 => None,
            n => Some(total / n as f64),
        }
    }

    /// 单个样本平均耗时 (微秒).
    #[inline]
    pub fn get_avg_measure_time_us(&self) -> Option<f64> {
        self.per_sample(self.get_measure_time_us() as f64)
    }

    /// 平均相对误差 (带符号, 正值表示高估).
    #[inline]
    pub fn get_mean_rel_error(&self) -> Option<f64> {
        self.per_sample(self.rel_error)
    }

    /// 平均绝对相对误差.
    #[inline]
    pub fn get_mean_abs_rel_error(&self) -> Option<f64> {
        self.per_sample(self.abs_rel_error)
    }

    /// 平均球形度.
    #[inline]
    pub fn get_mean_sphericity(&self) -> Option<f64> {
        self.per_sample(self.sphericity)
    }

    /// 单个样本最长耗时. 没有成功样本时返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_averages() {
        let mut p = Profile::new();
        assert!(p.get_mean_rel_error().is_none());
        p.count_measured(110.0, 100.0, 0.8);
        p.count_measured(90.0, 100.0, 1.0);
        p.count_failed();
        let p = p.finish();
        assert_eq!(p.get_measured(), 2);
        assert_eq!(p.get_failed(), 1);
        assert!(p.get_mean_rel_error().unwrap().abs() < 1e-12);
        assert!((p.get_mean_abs_rel_error().unwrap() - 0.1).abs() < 1e-12);
        assert!((p.get_mean_sphericity().unwrap() - 0.9).abs() < 1e-12);
        assert!(p.get_most_time_consuming().is_none());
    }
}
