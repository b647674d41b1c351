use actix_session::Session;

/// Global permission codes held by the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }

    pub fn from_csv(csv: &str) -> Self {
        let codes = csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Permissions(codes)
    }
}

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

/// Missing or unreadable permissions count as none.
pub fn get_permissions(session: &Session) -> Permissions {
    match session.get::<String>("permissions") {
        Ok(Some(csv)) => Permissions::from_csv(&csv),
        Ok(None) => Permissions::default(),
        Err(e) => {
            log::warn!("Unreadable permissions in session: {e}");
            Permissions::default()
        }
    }
}

/// Session key of the one-shot flash message. The portal pages share the
/// session, so the next page to call `take_flash` shows it, including the
/// page an import redirects back to.
pub const FLASH_KEY: &str = "flash";

pub fn set_flash(session: &Session, message: &str) {
    if let Err(e) = session.insert(FLASH_KEY, message) {
        log::warn!("Could not store flash message: {e}");
    }
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>(FLASH_KEY).unwrap_or(None);
    if flash.is_some() {
        session.remove(FLASH_KEY);
    }
    flash
}
