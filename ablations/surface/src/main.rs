//! 消融实验: 梯度法表面积与采样最大径在理想球体上的误差,
//! 以及体模上 "预测 -> 度量 -> 导出" 的完整流程.

mod result;
mod runner;

use simple_logger::SimpleLogger;
use utils::PhantomConfig;

fn main() {
    let cfg = PhantomConfig::from_env().expect("Loading phantom config error");
    SimpleLogger::new()
        .with_level(cfg.log_level)
        .init()
        .expect("Logger init error");
    log::info!("体模配置: {cfg:?}, 可用核心数 {}", utils::cpus());

    match runner::run(&cfg) {
        Ok(res) => res.analyze(),
        Err(e) => {
            log::error!("消融实验失败: {e}");
            std::process::exit(1);
        }
    }
}
