use crate::config::Settings;
use crate::database::{MongoDB, USERS};
use crate::models::{User, ROLE_ADMIN, ROLE_CUSTOMER};
use crate::services::auth_service::normalize_email;
use mongodb::bson::doc;

/// Creates the first admin account from ADMIN_EMAIL / ADMIN_PASSWORD.
/// Does nothing once any user holds the admin role.
pub async fn seed_admin(db: &MongoDB, settings: &Settings) {
    let (Some(email), Some(password)) = (settings.admin_email.as_deref(), settings.admin_password.as_deref()) else {
        log::info!("👤 Admin seed: ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping");
        return;
    };

    let collection = db.collection::<User>(USERS);

    let admins = match collection.count_documents(doc! { "roles": ROLE_ADMIN }).await {
        Ok(count) => count,
        Err(e) => {
            log::error!("   ❌ Admin seed: failed to count admins: {}", e);
            return;
        }
    };
    if admins > 0 {
        log::info!("👤 Admin seed: {} admin account(s) already in DB, skipping", admins);
        return;
    }

    let email = normalize_email(email);

    // An existing customer with the configured email is promoted rather than duplicated
    match collection
        .update_one(
            doc! { "email": &email },
            doc! { "$addToSet": { "roles": ROLE_ADMIN }, "$set": { "is_active": true } },
        )
        .await
    {
        Ok(result) if result.matched_count > 0 => {
            log::info!("   ✅ Promoted existing user {} to admin", email);
            return;
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("   ❌ Admin seed: failed to promote {}: {}", email, e);
            return;
        }
    }

    let hashed = match bcrypt::hash(password, bcrypt::DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            log::error!("   ❌ Admin seed: failed to hash password: {}", e);
            return;
        }
    };

    let now = chrono::Utc::now().timestamp();
    let admin = build_admin(&settings.admin_name, &email, hashed, now);

    match collection.insert_one(&admin).await {
        Ok(_) => log::info!("   ✅ Admin account created: {}", email),
        Err(e) => log::error!("   ❌ Admin seed: failed to create {}: {}", email, e),
    }
}

fn build_admin(name: &str, email: &str, password_hash: String, now: i64) -> User {
    User {
        id: None,
        name: name.to_string(),
        email: email.to_string(),
        password: password_hash,
        phone: None,
        avatar: None,
        roles: vec![ROLE_CUSTOMER.to_string(), ROLE_ADMIN.to_string()],
        is_active: true,
        addresses: vec![],
        cart: vec![],
        wishlist: vec![],
        created_at: now,
        updated_at: now,
        last_login: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_admin_has_admin_role() {
        let admin = build_admin("Store Admin", "admin@shop.in", "hash".into(), 1);
        assert!(admin.is_admin());
        assert!(admin.is_active);
        assert_eq!(admin.password, "hash");
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_seed_is_idempotent() {
        let mut settings = Settings::from_env();
        settings.admin_email = Some("seed-admin@example.com".into());
        settings.admin_password = Some("secret123".into());
        let db = MongoDB::new(&settings).await.unwrap();

        seed_admin(&db, &settings).await;
        seed_admin(&db, &settings).await;

        let count = db
            .collection::<User>(USERS)
            .count_documents(doc! { "email": "seed-admin@example.com" })
            .await
            .unwrap();
        assert!(count <= 1);
    }
}
