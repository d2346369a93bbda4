use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::query::SortMode;

pub fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    debug!("用户输入: {}", input.trim_end());
    Ok(input.trim_end_matches(['\r', '\n']).to_owned())
}

#[instrument]
pub fn prompt_sort_mode() -> Result<SortMode> {
    println!("排序方式:");
    for (i, mode) in SortMode::ALL.iter().enumerate() {
        println!("  {}. {}", i + 1, mode.label());
    }
    let input = prompt("请选择 (默认 1): ")?;
    Ok(parse_sort_choice(&input))
}

/// 接受序号或模式名，无法识别时使用默认排序
pub fn parse_sort_choice(input: &str) -> SortMode {
    let input = input.trim();
    match input.parse::<usize>() {
        Ok(n) if (1..=SortMode::ALL.len()).contains(&n) => SortMode::ALL[n - 1],
        _ => SortMode::parse(input),
    }
}

pub fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} (y/n): ", question))?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

pub fn format_elapsed(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms >= 60000 {
        // 超过1分钟：显示分秒
        let mins = total_ms / 60000;
        let secs = (total_ms % 60000) / 1000;
        format!("{}分{}秒", mins, secs)
    } else if total_ms >= 1000 {
        let secs = total_ms / 1000;
        let ms_remaining = total_ms % 1000;
        if ms_remaining > 0 {
            format!("{}秒{}毫秒", secs, ms_remaining)
        } else {
            format!("{}秒", secs)
        }
    } else {
        format!("{}毫秒", total_ms)
    }
}

pub fn display_elapsed_time(duration: Duration) {
    info!("✅ 加载完成！耗时: {}", format_elapsed(duration));
}
