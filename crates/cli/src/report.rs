use anyhow::Result;
use serde_json::{json, Value};
use xprofile_account::AccountInfo;
use xprofile_core::{AccountLoad, LoadReport, PersistReport, SkipReason};
use xprofile_gpd::{Achievement, GpdFile, TitlePlayed};

pub fn render_profile(account: &AccountInfo, dashboard: &GpdFile, report: &LoadReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Account: {} ({:016X}) [{}]\n",
        account.gamertag(),
        account.xuid_online,
        account_source(&report.account)
    ));

    let titles: Vec<&TitlePlayed> = dashboard.titles().collect();
    if titles.is_empty() {
        out.push_str("No titles played\n");
    } else {
        out.push_str(&format!("Titles ({}):\n", titles.len()));
        for title in titles {
            out.push_str(&format!("  {}\n", summary_line(title)));
        }
    }

    for skipped in &report.skipped {
        let reason = match &skipped.reason {
            SkipReason::Missing => "missing".to_string(),
            SkipReason::Corrupt(msg) => format!("corrupt: {msg}"),
        };
        out.push_str(&format!(
            "Skipped {:08X} ({}): {reason}\n",
            skipped.title_id, skipped.title_name
        ));
    }
    out
}

pub fn profile_json(
    account: &AccountInfo,
    dashboard: &GpdFile,
    report: &LoadReport,
) -> Result<Value> {
    let titles = dashboard
        .titles()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    let skipped: Vec<Value> = report
        .skipped
        .iter()
        .map(|s| {
            let (reason, detail) = match &s.reason {
                SkipReason::Missing => ("missing", None),
                SkipReason::Corrupt(msg) => ("corrupt", Some(msg.as_str())),
            };
            json!({
                "title_id": format!("{:08X}", s.title_id),
                "title_name": s.title_name,
                "reason": reason,
                "detail": detail,
            })
        })
        .collect();

    Ok(json!({
        "account": {
            "gamertag": account.gamertag(),
            "xuid": format!("{:016X}", account.xuid_online),
            "source": account_source(&report.account),
        },
        "titles": titles,
        "skipped": skipped,
    }))
}

pub fn render_achievements(summary: Option<&TitlePlayed>, gpd: &GpdFile) -> String {
    let mut out = String::new();
    match summary {
        Some(summary) => out.push_str(&format!("{}\n", summary_line(summary))),
        None => out.push_str(&format!("{:08X}\n", gpd.title_id())),
    }
    for ach in gpd.achievements() {
        out.push_str(&format!("  {}\n", achievement_line(ach)));
    }
    out
}

pub fn achievements_json(summary: Option<&TitlePlayed>, gpd: &GpdFile) -> Result<Value> {
    let achievements = gpd
        .achievements()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(json!({
        "title_id": format!("{:08X}", gpd.title_id()),
        "summary": summary.map(serde_json::to_value).transpose()?,
        "achievements": achievements,
    }))
}

pub fn render_persist(report: &PersistReport) -> String {
    let mut out = format!("Wrote {} title(s)\n", report.written.len());
    for (title_id, err) in &report.failed {
        out.push_str(&format!("Failed {title_id:08X}: {err}\n"));
    }
    out
}

pub fn persist_json(report: &PersistReport) -> Value {
    json!({
        "written": report.written.iter().map(|id| format!("{id:08X}")).collect::<Vec<_>>(),
        "failed": report
            .failed
            .iter()
            .map(|(id, err)| json!({ "title_id": format!("{id:08X}"), "error": err }))
            .collect::<Vec<_>>(),
    })
}

fn summary_line(title: &TitlePlayed) -> String {
    format!(
        "{:08X}  {}  {}/{} achievements  {}/{} G",
        title.title_id,
        title.title_name,
        title.achievements_earned,
        title.achievements_possible,
        title.gamerscore_earned,
        title.gamerscore_total
    )
}

fn achievement_line(ach: &Achievement) -> String {
    format!(
        "{:>5}  {:<8}  {:>3} G  {}",
        ach.id,
        if ach.is_unlocked() { "unlocked" } else { "locked" },
        ach.gamerscore,
        ach.label
    )
}

fn account_source(load: &AccountLoad) -> String {
    match load {
        AccountLoad::Unsealed(variant) => format!("{variant} key"),
        AccountLoad::NotFound => "placeholder, no account file".to_string(),
        AccountLoad::MissingKey => "placeholder, no root secret".to_string(),
        AccountLoad::IntegrityFailure => "placeholder, integrity check failed".to_string(),
        AccountLoad::Invalid(msg) => format!("placeholder, {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xprofile_core::{DashboardLoad, SkippedTitle};

    fn report(account: AccountLoad) -> LoadReport {
        LoadReport {
            account,
            dashboard: DashboardLoad::Loaded,
            titles_loaded: Vec::new(),
            skipped: vec![SkippedTitle {
                title_id: 0xABCD,
                title_name: "Broken".to_string(),
                reason: SkipReason::Missing,
            }],
        }
    }

    #[test]
    fn profile_text_lists_titles_and_skips() {
        let account = AccountInfo::new(0xE000_0000_0000_0042, "Tester").unwrap();
        let mut dashboard = GpdFile::dashboard();
        let mut title = TitlePlayed::new(0x1234, "Sample");
        title.achievements_possible = 2;
        title.gamerscore_total = 30;
        dashboard.update_title(title);

        let text = render_profile(&account, &dashboard, &report(AccountLoad::NotFound));
        assert!(text.contains("Tester (E000000000000042) [placeholder, no account file]"));
        assert!(text.contains("00001234  Sample  0/2 achievements  0/30 G"));
        assert!(text.contains("Skipped 0000ABCD (Broken): missing"));
    }

    #[test]
    fn profile_json_has_hex_ids() {
        let account = AccountInfo::new(1, "Json").unwrap();
        let value = profile_json(&account, &GpdFile::dashboard(), &report(AccountLoad::MissingKey))
            .unwrap();
        assert_eq!(value["account"]["xuid"], "0000000000000001");
        assert_eq!(value["skipped"][0]["title_id"], "0000ABCD");
        assert_eq!(value["skipped"][0]["reason"], "missing");
    }
}
