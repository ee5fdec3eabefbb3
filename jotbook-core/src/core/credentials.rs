//! Durable registry of user accounts and the current-user pointer.
//!
//! [`CredentialStore`] owns the [`USERS_KEY`] and [`CURRENT_USER_KEY`] records.
//! The user set is always read and written whole; the current-user pointer is a
//! separate record so signing in or out never rewrites the registry.
//!
//! Lookups report absence as `Ok(None)`. Errors are reserved for storage
//! failures, malformed records, and broken uniqueness rules.

use tokio::sync::Mutex;

use crate::core::password::verify_password;
use crate::core::storage::{read_json, write_json, KeyValueStore, CURRENT_USER_KEY, USERS_KEY};
use crate::{JotbookError, Result, User};

/// Registered users and the signed-in pointer, persisted through a [`KeyValueStore`].
pub struct CredentialStore<S> {
    store: S,
    /// Held across every read-modify-write of the user set.
    users_lock: Mutex<()>,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            users_lock: Mutex::new(()),
        }
    }

    /// Returns every registered user, or an empty list if none were ever stored.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails or the record is malformed.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(read_json(&self.store, USERS_KEY).await?.unwrap_or_default())
    }

    /// Returns the first registered user matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the user set cannot be read.
    pub async fn find_user<F>(&self, predicate: F) -> Result<Option<User>>
    where
        F: Fn(&User) -> bool,
    {
        Ok(self.list_users().await?.into_iter().find(|u| predicate(u)))
    }

    /// Looks a user up by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the user set cannot be read.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_user(|u| u.id == id).await
    }

    /// Returns the user whose email matches exactly and whose password verifies.
    ///
    /// A stored hash that cannot be parsed counts as a mismatch.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the user set cannot be read.
    pub async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_user(|u| u.email == email).await? else {
            return Ok(None);
        };
        match verify_password(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            Ok(false) => Ok(None),
            Err(e) => {
                log::warn!("stored password hash for user {} is unreadable: {e}", user.id);
                Ok(None)
            }
        }
    }

    /// Overwrites the whole user set.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails; the previous set is left intact.
    pub async fn persist_users(&self, users: &[User]) -> Result<()> {
        let _guard = self.users_lock.lock().await;
        write_json(&self.store, USERS_KEY, users).await
    }

    /// Appends `user` to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::Conflict`] if the email is already registered, in
    /// which case nothing is written.
    pub async fn insert_user(&self, user: User) -> Result<()> {
        let _guard = self.users_lock.lock().await;
        let users = with_inserted(self.list_users().await?, user)?;
        write_json(&self.store, USERS_KEY, &users).await
    }

    /// Replaces the stored record that has `updated.id` with `updated`.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::UserNotFound`] if no user has that id, or
    /// [`JotbookError::Conflict`] if a different user already owns `updated.email`.
    pub async fn replace_user(&self, updated: &User) -> Result<()> {
        let _guard = self.users_lock.lock().await;
        let users = with_replaced(self.list_users().await?, updated)?;
        write_json(&self.store, USERS_KEY, &users).await
    }

    /// Appends `user` to the registry and points the session at it.
    ///
    /// If the pointer cannot be written the registry is put back as it was, so
    /// the email stays free for another attempt.
    ///
    /// # Errors
    ///
    /// Same as [`insert_user`](Self::insert_user), plus a storage error from the
    /// pointer write.
    pub async fn insert_and_sign_in(&self, user: &User) -> Result<()> {
        let _guard = self.users_lock.lock().await;
        let previous = self.list_users().await?;
        let users = with_inserted(previous.clone(), user.clone())?;
        self.commit_with_pointer(&previous, &users, user).await
    }

    /// Replaces `updated`'s record and repoints the session at the new copy.
    ///
    /// If the pointer cannot be written the old record is restored.
    ///
    /// # Errors
    ///
    /// Same as [`replace_user`](Self::replace_user), plus a storage error from
    /// the pointer write.
    pub async fn replace_and_sign_in(&self, updated: &User) -> Result<()> {
        let _guard = self.users_lock.lock().await;
        let previous = self.list_users().await?;
        let users = with_replaced(previous.clone(), updated)?;
        self.commit_with_pointer(&previous, &users, updated).await
    }

    /// Writes `users`, then the pointer. Caller must hold `users_lock`.
    async fn commit_with_pointer(
        &self,
        previous: &[User],
        users: &[User],
        current: &User,
    ) -> Result<()> {
        write_json(&self.store, USERS_KEY, users).await?;
        if let Err(e) = write_json(&self.store, CURRENT_USER_KEY, current).await {
            if let Err(undo) = write_json(&self.store, USERS_KEY, previous).await {
                log::error!("failed to restore user set after pointer write failed: {undo}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Reads the current-user pointer.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails or the record is malformed.
    pub async fn current_user(&self) -> Result<Option<User>> {
        read_json(&self.store, CURRENT_USER_KEY).await
    }

    /// Points the session at `user`, or clears the pointer when `None`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub async fn set_current_user(&self, user: Option<&User>) -> Result<()> {
        match user {
            Some(user) => write_json(&self.store, CURRENT_USER_KEY, user).await,
            None => self.store.remove(CURRENT_USER_KEY).await,
        }
    }
}

fn with_inserted(mut users: Vec<User>, user: User) -> Result<Vec<User>> {
    if users.iter().any(|u| u.email == user.email) {
        return Err(JotbookError::Conflict(format!(
            "Email {} is already registered",
            user.email
        )));
    }
    users.push(user);
    Ok(users)
}

fn with_replaced(mut users: Vec<User>, updated: &User) -> Result<Vec<User>> {
    if users
        .iter()
        .any(|u| u.id != updated.id && u.email == updated.email)
    {
        return Err(JotbookError::Conflict(format!(
            "Email {} is already registered",
            updated.email
        )));
    }
    let slot = users
        .iter_mut()
        .find(|u| u.id == updated.id)
        .ok_or_else(|| JotbookError::UserNotFound(updated.id.clone()))?;
    *slot = updated.clone();
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{FailingStore, YieldingStore};
    use crate::MemoryStore;

    fn credentials() -> CredentialStore<MemoryStore> {
        CredentialStore::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_list_users_empty_when_nothing_stored() {
        let creds = credentials();
        assert!(creds.list_users().await.unwrap().is_empty());
        assert!(creds.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let creds = credentials();
        let user = User::register("ada", "ada@example.com", "engine").unwrap();
        creds.insert_user(user.clone()).await.unwrap();

        assert_eq!(creds.find_by_id(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            creds.find_by_credentials("ada@example.com", "engine").await.unwrap(),
            Some(user)
        );
        assert!(creds
            .find_by_credentials("ada@example.com", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(creds
            .find_by_credentials("nobody@example.com", "engine")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_email_is_conflict() {
        let creds = credentials();
        let first = User::register("ada", "ada@example.com", "engine").unwrap();
        creds.insert_user(first.clone()).await.unwrap();

        let second = User::register("imposter", "ada@example.com", "other").unwrap();
        let result = creds.insert_user(second).await;
        assert!(matches!(result, Err(JotbookError::Conflict(_))));

        assert_eq!(creds.list_users().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn test_replace_user_checks_other_users_email() {
        let creds = credentials();
        let ada = User::register("ada", "ada@example.com", "engine").unwrap();
        let bob = User::register("bob", "bob@example.com", "builder").unwrap();
        creds.insert_user(ada.clone()).await.unwrap();
        creds.insert_user(bob.clone()).await.unwrap();

        // Keeping your own email is fine.
        let mut renamed = ada.clone();
        renamed.username = "Ada L.".to_string();
        creds.replace_user(&renamed).await.unwrap();
        assert_eq!(creds.find_by_id(&ada.id).await.unwrap().unwrap().username, "Ada L.");

        // Taking someone else's is not.
        let mut stealing = renamed.clone();
        stealing.email = bob.email.clone();
        let result = creds.replace_user(&stealing).await;
        assert!(matches!(result, Err(JotbookError::Conflict(_))));
        assert_eq!(
            creds.find_by_id(&ada.id).await.unwrap().unwrap().email,
            "ada@example.com"
        );
    }

    #[tokio::test]
    async fn test_replace_unknown_user() {
        let creds = credentials();
        let ghost = User::register("ghost", "ghost@example.com", "boo").unwrap();
        let result = creds.replace_user(&ghost).await;
        assert!(matches!(result, Err(JotbookError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_current_user_pointer_is_independent_of_user_set() {
        let creds = credentials();
        let ada = User::register("ada", "ada@example.com", "engine").unwrap();

        creds.set_current_user(Some(&ada)).await.unwrap();
        assert_eq!(creds.current_user().await.unwrap(), Some(ada));
        assert!(creds.list_users().await.unwrap().is_empty());

        creds.set_current_user(None).await.unwrap();
        assert!(creds.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_users_overwrites_whole_set() {
        let creds = credentials();
        let ada = User::register("ada", "ada@example.com", "engine").unwrap();
        let bob = User::register("bob", "bob@example.com", "builder").unwrap();
        creds.insert_user(ada).await.unwrap();

        creds.persist_users(&[bob.clone()]).await.unwrap();
        assert_eq!(creds.list_users().await.unwrap(), vec![bob]);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let creds = CredentialStore::new(YieldingStore::default());
        let ada = User::register("ada", "ada@example.com", "engine").unwrap();
        let bob = User::register("bob", "bob@example.com", "builder").unwrap();

        let (a, b) = tokio::join!(creds.insert_user(ada.clone()), creds.insert_user(bob.clone()));
        a.unwrap();
        b.unwrap();

        let users = creds.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.contains(&ada));
        assert!(users.contains(&bob));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_one_email_conflict_once() {
        let creds = CredentialStore::new(YieldingStore::default());
        let first = User::register("ada", "ada@example.com", "engine").unwrap();
        let second = User::register("imposter", "ada@example.com", "other").unwrap();

        let (a, b) = tokio::join!(creds.insert_user(first), creds.insert_user(second));
        let conflicts = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(JotbookError::Conflict(_))))
            .count();
        assert_eq!(conflicts, 1);
        assert!(a.is_ok() || b.is_ok());
        assert_eq!(creds.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_and_sign_in_rolls_back_on_pointer_failure() {
        let store = FailingStore::default();
        let creds = CredentialStore::new(store.clone());
        let ada = User::register("ada", "ada@example.com", "engine").unwrap();

        store.fail_nth_write(2);
        assert!(creds.insert_and_sign_in(&ada).await.is_err());
        assert!(creds.list_users().await.unwrap().is_empty());
        assert!(creds.current_user().await.unwrap().is_none());

        creds.insert_and_sign_in(&ada).await.unwrap();
        assert_eq!(creds.list_users().await.unwrap(), vec![ada.clone()]);
        assert_eq!(creds.current_user().await.unwrap(), Some(ada));
    }

    #[tokio::test]
    async fn test_replace_and_sign_in_rolls_back_on_pointer_failure() {
        let store = FailingStore::default();
        let creds = CredentialStore::new(store.clone());
        let ada = User::register("ada", "ada@example.com", "engine").unwrap();
        creds.insert_and_sign_in(&ada).await.unwrap();

        let mut moved = ada.clone();
        moved.email = "new@example.com".to_string();
        store.fail_nth_write(2);
        assert!(creds.replace_and_sign_in(&moved).await.is_err());

        assert_eq!(creds.list_users().await.unwrap(), vec![ada.clone()]);
        assert_eq!(creds.current_user().await.unwrap(), Some(ada));
    }
}
