use std::fmt;
use serenity::model::prelude::*;
use serenity::prelude::*;

/// What a Discord member may do with the governor commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum UserRole {
    #[default]
    Member,
    Officer,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UserRole::Member => write!(f, "Member"),
            UserRole::Officer => write!(f, "Officer"),
        }
    }
}

impl UserRole {
    /// Officer when any of the member's role names matches one of `officer_roles` exactly.
    pub fn from_role_names<'a, I>(role_names: I, officer_roles: &[String]) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let is_officer = role_names
            .into_iter()
            .any(|name| officer_roles.iter().any(|allowed| allowed == name));
        if is_officer {
            UserRole::Officer
        } else {
            UserRole::Member
        }
    }
}

/// Names of the roles held by the author of `msg`. Direct messages carry no roles.
pub async fn member_role_names(ctx: &Context, msg: &Message) -> Result<Vec<String>, serenity::Error> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(Vec::new());
    };

    let role_ids = match &msg.member {
        Some(member) => member.roles.clone(),
        None => guild_id.member(&ctx.http, msg.author.id).await?.roles,
    };
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let cached = guild_id.to_guild_cached(&ctx.cache).map(|guild| {
        role_ids
            .iter()
            .filter_map(|id| guild.roles.get(id).map(|role| role.name.clone()))
            .collect::<Vec<_>>()
    });
    if let Some(names) = cached {
        return Ok(names);
    }

    let guild_roles = guild_id.roles(&ctx.http).await?;
    Ok(role_ids
        .iter()
        .filter_map(|id| guild_roles.get(id).map(|role| role.name.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn officer_roles() -> Vec<String> {
        vec!["R4".to_string(), "Council".to_string(), "King".to_string()]
    }

    #[test]
    fn any_configured_role_makes_an_officer() {
        assert_eq!(UserRole::from_role_names(["Member", "Council"], &officer_roles()), UserRole::Officer);
        assert_eq!(UserRole::from_role_names(["King"], &officer_roles()), UserRole::Officer);
    }

    #[test]
    fn role_names_match_exactly() {
        assert_eq!(UserRole::from_role_names(["r4", "Kings"], &officer_roles()), UserRole::Member);
        assert_eq!(UserRole::from_role_names(Vec::<&str>::new(), &officer_roles()), UserRole::Member);
    }

    #[test]
    fn officers_outrank_members() {
        assert!(UserRole::Officer > UserRole::Member);
        assert_eq!(UserRole::default(), UserRole::Member);
    }
}
