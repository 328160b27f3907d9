use crate::Email;

pub fn password_reset(to: &str, from: &str, reset_link: &str) -> Email {
    Email {
        to: to.to_string(),
        from: from.to_string(),
        reply_to: None,
        subject: "Reset your password on Manavjyot Charity Site".to_string(),
        text: format!(
            "You are receiving this email because you (or someone else) have requested the reset \
             of the password for your account.\n\n\
             Please click on the following link, or paste this into your browser to complete the \
             process:\n\n{reset_link}\n\n\
             If you did not request this, please ignore this email and your password will remain \
             unchanged.\n"
        ),
    }
}

pub fn password_changed(to: &str, from: &str) -> Email {
    Email {
        to: to.to_string(),
        from: from.to_string(),
        reply_to: None,
        subject: "Your manavjyot account's password has been changed".to_string(),
        text: format!(
            "Hello,\n\nThis is a confirmation that the password for your account {to} has just \
             been changed.\n"
        ),
    }
}

/// Contact-form message delivered to the site inbox, replying to the sender.
pub fn contact(site: &str, name: &str, sender: &str, message: &str) -> Email {
    Email {
        to: site.to_string(),
        from: site.to_string(),
        reply_to: Some(sender.to_string()),
        subject: format!("Message from {name}!"),
        text: format!("Hey message from {name} <{sender}>\n\n{message}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_mail_carries_link() {
        let mail = password_reset("a@example.com", "site@example.com", "https://x.test/reset/abc");
        assert!(mail.text.contains("https://x.test/reset/abc"));
        assert_eq!(mail.to, "a@example.com");
    }

    #[test]
    fn contact_mail_replies_to_sender() {
        let mail = contact("site@example.com", "Asha", "asha@example.com", "Can I volunteer?");
        assert_eq!(mail.to, "site@example.com");
        assert_eq!(mail.reply_to.as_deref(), Some("asha@example.com"));
        assert_eq!(mail.subject, "Message from Asha!");
        assert!(mail.text.contains("Can I volunteer?"));
    }
}
