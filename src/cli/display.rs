use chrono::{DateTime, Datelike, Local, Timelike, Utc};

use crate::models::{Call, Contact, ContactLog, Membership};

/// One line per contact for list output.
pub fn print_contact_row(contact: &Contact, caller: Option<&str>) {
    let special = if contact.is_special { " *" } else { "" };
    println!(
        "  {:<24} {:<15} {:<14} {}{}",
        truncate(&contact.full_name, 24),
        contact.phone,
        contact.call_status.as_str(),
        caller.unwrap_or("-"),
        special
    );
}

/// Print a contact with its calls and audit trail (only non-empty parts).
pub fn print_contact_detail(
    contact: &Contact,
    caller: Option<&str>,
    calls: &[Call],
    logs: &[ContactLog],
) {
    println!("{}\n", contact.full_name);
    println!("  {}", contact.phone);
    println!("  Status: {}", contact.call_status.as_str());
    match caller {
        Some(name) => println!("  Caller: {}", name),
        None => println!("  Caller: unassigned"),
    }
    if contact.is_special {
        println!("  Special (pre-assigned at import)");
    }
    if !contact.is_active {
        println!("  Inactive");
    }
    if let Some(last) = contact.last_call_date {
        println!("  Last call: {}", format_when(&last));
    }

    if !calls.is_empty() {
        println!("\n  Calls");
        for call in calls {
            let result = call.result.map_or("-", |r| r.as_str());
            let duration = call
                .duration
                .map(|d| format!(" {}s", d))
                .unwrap_or_default();
            let locked = if call.is_editable { "" } else { " (locked)" };
            println!(
                "  {} {}{}{}  {}",
                format_when(&call.call_date),
                result,
                duration,
                locked,
                call.id
            );
            if let Some(ref notes) = call.notes {
                println!("      {}", truncate(notes, 60));
            }
        }
    }

    if !logs.is_empty() {
        println!("\n  History");
        for log in logs {
            println!("  {} {}", format_when(&log.created_at), log.action);
        }
    }
}

pub fn print_member(member: &Membership, username: &str) {
    println!("  {:<20} {}", username, member.role.as_str());
}

/// Local time, shortened for recent dates.
pub fn format_when(at: &DateTime<Utc>) -> String {
    let date = at.with_timezone(&Local);
    let now = Local::now();
    let (pm, hour) = date.hour12();
    let time = format!("{}:{:02}{}", hour, date.minute(), if pm { "pm" } else { "am" });

    if date.date_naive() == now.date_naive() {
        format!("Today at {}", time)
    } else if date.year() == now.year() {
        format!("{} {} at {}", month_abbrev(date.month()), date.day(), time)
    } else {
        format!(
            "{} {}, {} at {}",
            month_abbrev(date.month()),
            date.day(),
            date.year(),
            time
        )
    }
}

fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "???",
    }
}

/// First line, at most `max_len` characters.
fn truncate(text: &str, max_len: usize) -> String {
    let trimmed = text.lines().next().unwrap_or("").trim();

    if trimmed.chars().count() <= max_len {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(max_len - 1).collect();
        format!("{}…", truncated.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CallResult;
    use uuid::Uuid;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("first line\nsecond", 20), "first line");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_format_when_today() {
        assert!(format_when(&Utc::now()).starts_with("Today at "));
    }

    #[test]
    fn test_print_contact_detail_does_not_panic() {
        let mut contact = Contact::new(Uuid::new_v4(), "Sara".into(), "0912".into());
        contact.is_special = true;
        let mut call = Call::new(contact.id, Uuid::new_v4(), contact.project_id);
        call.result = Some(CallResult::Answered);
        call.notes = Some("call back after lunch".into());
        let log = ContactLog::new(contact.id, "Claimed by a".into(), None);

        print_contact_detail(&contact, Some("a"), &[call], &[log]);
        print_contact_row(&contact, None);
    }
}
