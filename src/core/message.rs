use crate::domain::model::OutboundMessage;
use chrono::Local;
use uuid::Uuid;

pub fn build_subject(role: &str) -> String {
    format!("Follow-up on my application for {}", role)
}

pub fn build_body(company: &str, role: &str, sender_name: &str) -> String {
    format!(
        "Hi {company} hiring team,\n\n\
         I hope you’re doing well. I just wanted to kindly check in again regarding the {role} position. \
         I'm still enthusiastic and interested in the role at {company} and would love to know if there are any updates on the next steps.\n\
         \n\
         If I'm not selected for this role, I would love to get some feedback so that it would help me to better position myself in future applications.\n\
         Thank you for your time and consideration, and I look forward to hearing from you.\n\
         \n\
         Cheers,\n\
         {sender_name}\n"
    )
}

/// `<uuid@domain>`, using the sender's domain when it has one.
fn make_message_id(sender: &str) -> String {
    let domain = sender
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");
    format!("<{}@{}>", Uuid::new_v4().simple(), domain)
}

/// Inputs are assumed to be normalized already.
pub fn create_message(
    sender: &str,
    recipient: &str,
    company: &str,
    role: &str,
    sender_name: &str,
) -> OutboundMessage {
    OutboundMessage {
        from: sender.to_string(),
        to: recipient.to_string(),
        date: Local::now(),
        message_id: make_message_id(sender),
        subject: build_subject(role),
        body: build_body(company, role, sender_name),
    }
}
