//! Outbound email templates.
//!
//! Every function returns `(subject, body)` as plain text. Rendering is
//! pure except for the daily prompt, which picks a quote at random.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::Rng;

const QUOTES: &[&str] = &[
    "Small steps every day add up to big results.",
    "What gets written down gets remembered.",
    "Done is better than perfect.",
    "You can't improve what you don't track.",
    "The best time to write it down was this morning. The second best time is now.",
    "A short reply today beats a perfect reply never.",
];

/// Verification email sent when signup starts or a code is reissued.
pub fn verification_email(code: &str) -> (String, String) {
    let subject = "Confirm your journal signup".to_string();
    let body = format!(
        "Welcome!\n\n\
         Your verification code is: {code}\n\n\
         Reply to this email with the code and your details:\n\n\
         Name: \n\
         Timezone: \n\
         Prompt time: \n\
         Project: \n\n\
         Timezone can be an IANA name (America/New_York) or a common\n\
         abbreviation (PST). Prompt time is when you'd like your daily\n\
         nudge, in your local time. Project is optional.\n"
    );
    (subject, body)
}

/// Confirmation sent once verification succeeds.
pub fn welcome_email(name: &str, prompt_time: NaiveTime) -> (String, String) {
    let subject = "You're all set".to_string();
    let body = format!(
        "Hi {name},\n\n\
         Your journal is active. Every day around {} we'll ask what you\n\
         got done. Just reply in plain text.\n\n\
         A few extras when you need them:\n\
         - <pause>2 weeks</pause> takes a break\n\
         - <project>name</project> sets your current project\n\
         - <entry>text</entry> records an entry explicitly\n\n\
         On Fridays you'll get a summary of your week.\n",
        prompt_time.format("%-I:%M %p")
    );
    (subject, body)
}

/// The daily nudge.
pub fn daily_prompt(now: DateTime<Utc>, project_focus: Option<&str>) -> (String, String) {
    let subject = format!("What did you get done today? ({})", now.format("%b %-d"));
    let quote = QUOTES[rand::thread_rng().gen_range(0..QUOTES.len())];
    let focus_line = match project_focus {
        Some(project) => format!("Current project: {project}\n\n"),
        None => String::new(),
    };
    let body = format!(
        "Hi!\n\n\
         What did you get done today? Reply to this email and it goes\n\
         straight into your journal.\n\n\
         {focus_line}\"{quote}\"\n"
    );
    (subject, body)
}

/// Friday week-in-review email.
pub fn weekly_summary_email(
    week_start: NaiveDate,
    paragraph: &str,
    bullet_points: &[String],
) -> (String, String) {
    let week_end = week_start + chrono::TimeDelta::days(4);
    let subject = format!(
        "Your week in review: {} – {}",
        week_start.format("%b %-d"),
        week_end.format("%b %-d")
    );

    let mut body = format!("Here's what you got done this week:\n\n{paragraph}\n");
    if !bullet_points.is_empty() {
        body.push_str("\nHighlights:\n");
        for point in bullet_points {
            body.push_str(&format!("  - {point}\n"));
        }
    }
    body.push_str("\nNice work. See you Monday.\n");
    (subject, body)
}

/// Sent when a reply could not be interpreted. `hint` explains what to fix.
pub fn clarification_email(hint: &str) -> (String, String) {
    let subject = "We couldn't read that reply".to_string();
    let body = format!(
        "{hint}\n\n\
         Reply to this email to try again.\n"
    );
    (subject, body)
}
