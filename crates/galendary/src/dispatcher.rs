//! Request → command → handler.

use asupersync::{Cx, Outcome};
use galendary_core::{Error, Request};
use galendary_notify::{DisabledNotifier, Notifier};
use galendary_pool::{ExecutionContext, PoolFactory};

use crate::command::Command;
use crate::handlers::{self, Call, accounts, entries, groups, membership, related};
use crate::payload::Payload;

/// Routes each request to exactly one handler.
///
/// The dispatcher holds no per-request state; the pool lives in the
/// [`ExecutionContext`] passed with every call.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher<N = DisabledNotifier> {
    notifier: N,
}

impl<N: Notifier> Dispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self { notifier }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Resolve the command token without running anything.
    ///
    /// An absent or empty token is [`Error::NoCommand`]; anything not in the
    /// command table is [`Error::UnknownCommand`].
    pub fn resolve(request: &Request) -> Result<Command, Error> {
        match request.command_token() {
            None | Some("") => Err(Error::NoCommand),
            Some(token) => {
                Command::parse(token).ok_or_else(|| Error::UnknownCommand(token.to_string()))
            }
        }
    }

    /// Handle one request.
    ///
    /// Sentinel nulls are normalized before the token is read, so every handler
    /// sees real nulls.
    #[tracing::instrument(level = "debug", skip_all, fields(command = tracing::field::Empty))]
    pub async fn dispatch<F: PoolFactory>(
        &self,
        cx: &Cx,
        mut request: Request,
        context: Option<&ExecutionContext<F>>,
    ) -> Outcome<Payload, Error> {
        request.normalize_nulls();
        let command = match Self::resolve(&request) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected request");
                return Outcome::Err(e);
            }
        };
        tracing::Span::current().record("command", command.name());

        let call = Call::new(cx, &request, context);
        let outcome = self.run(command, &call).await;
        if let Outcome::Err(e) = &outcome {
            tracing::debug!(stage = %e.stage(), error = %e, "Command failed");
        }
        outcome
    }

    /// Callback form of [`dispatch`](Self::dispatch). `callback` is invoked
    /// exactly once.
    pub async fn dispatch_with<F, C>(
        &self,
        cx: &Cx,
        request: Request,
        context: Option<&ExecutionContext<F>>,
        callback: C,
    ) where
        F: PoolFactory,
        C: FnOnce(Outcome<Payload, Error>),
    {
        callback(self.dispatch(cx, request, context).await);
    }

    async fn run<F: PoolFactory>(
        &self,
        command: Command,
        call: &Call<'_, F>,
    ) -> Outcome<Payload, Error> {
        match command {
            Command::Test => handlers::test(call).await,
            Command::VerifyLogin => accounts::verify_login(call).await,
            Command::CreateUser => accounts::create_user(call).await,
            Command::GetUser => accounts::get_user(call).await,
            Command::GetUsername => accounts::get_username(call).await,
            Command::ChangeUserDisplayName => accounts::change_user_display_name(call).await,
            Command::ChangePassword => accounts::change_password(call).await,
            Command::ResetPassword => accounts::reset_password(call, &self.notifier).await,
            Command::DeleteUser => accounts::delete_user(call).await,
            Command::CreateGroup => groups::create_group(call).await,
            Command::AlterGroup => groups::alter_group(call).await,
            Command::DissolveGroup => groups::dissolve_group(call).await,
            Command::SearchGroupName => groups::search_group_name(call).await,
            Command::GetAllGroups => groups::get_all_groups(call).await,
            Command::GetGroupName => groups::get_group_name(call).await,
            Command::LoadGroupMembers => groups::load_group_members(call).await,
            Command::PromoteToAdmin => groups::promote_to_admin(call).await,
            Command::LeaveGroup => groups::leave_group(call).await,
            Command::GetAdminEmail => membership::get_admin_email(call).await,
            Command::AddAdminEmail => membership::add_admin_email(call).await,
            Command::GenerateEnrollmentCode => membership::generate_enrollment_code(call).await,
            Command::GetEnrollmentCode => membership::get_enrollment_code(call).await,
            Command::JoinGroupByEnrollmentCode => {
                membership::join_group_by_enrollment_code(call).await
            }
            Command::CreateRequest => membership::create_request(call).await,
            Command::RespondRequest => membership::respond_request(call).await,
            Command::GetRequests => membership::get_requests(call).await,
            Command::CreateEntry => entries::create_entry(call).await,
            Command::UpdateEntry => entries::update_entry(call).await,
            Command::DeleteEntry => entries::delete_entry(call).await,
            Command::GetAllEntries => entries::get_all_entries(call).await,
            Command::GetAllEntriesAndGroups => entries::get_all_entries_and_groups(call).await,
            Command::AddGroupToRelated => related::add_group_to_related(call).await,
            Command::RemoveGroupFromRelated => related::remove_group_from_related(call).await,
            Command::GetRelatedGroups => related::get_related_groups(call).await,
            Command::GetEventsOfGroupMembers => related::get_events_of_group_members(call).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tokens() {
        let req = Request::new().with("c", "v_l");
        assert_eq!(
            Dispatcher::<DisabledNotifier>::resolve(&req).unwrap(),
            Command::VerifyLogin
        );

        let req = Request::new().with("command", "");
        assert!(matches!(
            Dispatcher::<DisabledNotifier>::resolve(&req),
            Err(Error::NoCommand)
        ));

        let req = Request::new().with("username", "ann");
        assert!(matches!(
            Dispatcher::<DisabledNotifier>::resolve(&req),
            Err(Error::NoCommand)
        ));

        let req = Request::new().with("c", "drop_tables");
        assert!(matches!(
            Dispatcher::<DisabledNotifier>::resolve(&req),
            Err(Error::UnknownCommand(ref t)) if t == "drop_tables"
        ));
    }
}
