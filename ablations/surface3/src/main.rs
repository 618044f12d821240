//! 表面积估计方法 (面计数, 梯度加权, 网格) 在合成体数据上的消融实验.

mod estimators;
mod result;
mod runner;

fn main() -> std::io::Result<()> {
    simple_logger::init_with_level(log::Level::Info).expect("Logger initialization error");
    runner::run().analyze()
}
