use std::time::Instant;

use anyhow::Result;
use tracing::warn;

use card_fetch::image::probe_local;
use card_fetch::utils::{confirm, display_elapsed_time, prompt, prompt_sort_mode};
use card_fetch::library::SheetLibrary;
use card_fetch::{AppConfig, ChapterView, LoadStatus, Origin, QueryContext};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    card_fetch::logger::init();

    let config = AppConfig::load()?;
    let mut library = SheetLibrary::from_config(&config)?;

    println!("\n=== card-fetch ===");
    println!("載入資料中...");
    let start = Instant::now();
    if let LoadStatus::Error(message) = library.load().await {
        println!("{}", message);
        return Ok(());
    }
    display_elapsed_time(start.elapsed());
    if library.origin() == Some(Origin::StaleCache) {
        warn!("网络不可用，显示的是过期缓存");
    }

    loop {
        let query = prompt("\n搜尋卡片 (留空顯示全部): ")?;
        let sort = prompt_sort_mode()?;
        let ctx = QueryContext::new(query, sort);

        let chapters = library.get_chapters(&ctx);
        if chapters.is_empty() {
            println!("找不到符合條件的卡片");
        } else {
            for (batch_index, batch) in library.batches(&chapters).enumerate() {
                if batch_index > 0 && !confirm("顯示更多?")? {
                    break;
                }
                for chapter in batch {
                    print_card(&library, &config, chapter).await;
                }
            }

            let name = prompt("\n輸入章節名稱查看詳細內容 (留空跳過): ")?;
            let name = name.trim();
            if !name.is_empty() {
                match library.chapter(name) {
                    Some(chapter) => print_detail(&library, &config, &chapter).await,
                    None => println!("找不到章節: {}", name),
                }
            }
        }

        if !confirm("\n是否繼續搜尋?")? {
            break;
        }
    }

    println!("程序结束。");
    Ok(())
}

async fn cover_line(library: &SheetLibrary, config: &AppConfig, key: &str, large: bool) -> String {
    let candidates = library.resolve_image_candidates(key, large);
    match probe_local(&config.image_root, &candidates).await {
        Some(path) => path.display().to_string(),
        None => "[無圖片]".to_string(),
    }
}

async fn print_card(library: &SheetLibrary, config: &AppConfig, chapter: &ChapterView) {
    println!("\n【{}】{}", chapter.name, chapter.hero_title);
    let mut meta = format!("  {} 張卡片", chapter.total);
    if chapter.outer_count > 0 {
        meta.push_str(&format!(" · {} 主卡", chapter.outer_count));
    }
    if chapter.node_count > 0 {
        meta.push_str(&format!(" · {} 節點", chapter.node_count));
    }
    println!("{}", meta);
    if !chapter.hero_body.is_empty() {
        println!("  {}", chapter.hero_body.replace('\n', " "));
    }
    println!("  封面: {}", cover_line(library, config, &chapter.hero_cover, false).await);
}

async fn print_detail(library: &SheetLibrary, config: &AppConfig, chapter: &ChapterView) {
    println!("\n=== {} ===", chapter.name);
    println!("封面: {}", cover_line(library, config, &chapter.hero_cover, true).await);
    println!("總計: {} 張卡片", chapter.total);

    for (title, cards) in [("章節卡片", &chapter.outer_rows), ("子節點", &chapter.node_rows)] {
        if cards.is_empty() {
            continue;
        }
        println!("\n-- {} ({}) --", title, cards.len());
        for card in cards {
            println!("\n  ▸ {}", card.title);
            for line in card.body.lines() {
                println!("    {}", line);
            }
            println!("    圖片: {}", cover_line(library, config, &card.cover, false).await);
        }
    }
}
