use super::SqliteRepository;
use super::mapper::map_ticket_row;
use super::queries::{SELECT_TICKET, SELECT_TICKETS_BY_OWNER, UPSERT_TICKET};
use crate::application::ports::repositories::TicketRepository;
use crate::domain::entities::Ticket;
use crate::infrastructure::database::Statement;
use crate::params;
use crate::shared::error::AppError;
use async_trait::async_trait;

fn upsert_statement(ticket: &Ticket) -> Statement {
    (
        UPSERT_TICKET.to_string(),
        params![
            ticket.contract_address.as_str(),
            ticket.token_id.as_str(),
            ticket.event_id,
            ticket.owner.as_str(),
            ticket.purchase_price.as_str(),
            ticket.is_used,
            ticket.is_listed,
            ticket.metadata_uri.as_deref(),
            ticket.image_uri.as_deref(),
            ticket.last_synced,
        ],
    )
}

#[async_trait]
impl TicketRepository for SqliteRepository {
    async fn upsert_tickets(&self, tickets: &[Ticket]) -> Result<u64, AppError> {
        let statements: Vec<Statement> = tickets.iter().map(upsert_statement).collect();
        self.store.exec_batch(&statements).await
    }

    async fn get_ticket(
        &self,
        contract_address: &str,
        token_id: &str,
    ) -> Result<Option<Ticket>, AppError> {
        let row = self
            .store
            .query_optional(SELECT_TICKET, &params![contract_address, token_id])
            .await?;

        match row {
            Some(row) => Ok(Some(map_ticket_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn tickets_by_owner(&self, owner: &str) -> Result<Vec<Ticket>, AppError> {
        let rows = self
            .store
            .query(SELECT_TICKETS_BY_OWNER, &params![owner])
            .await?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            tickets.push(map_ticket_row(&row)?);
        }
        Ok(tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{repository, ticket};
    use super::*;

    const ALICE: &str = "0x00000000000000000000000000000000000000a1";
    const BOB: &str = "0x00000000000000000000000000000000000000b2";

    #[tokio::test]
    async fn transfer_moves_ticket_between_owners() {
        let repo = repository().await;
        repo.upsert_tickets(&[ticket("2", ALICE, 10), ticket("10", ALICE, 10)])
            .await
            .unwrap();

        let owned: Vec<String> = repo
            .tickets_by_owner(ALICE)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.token_id)
            .collect();
        assert_eq!(owned, vec!["2", "10"]);

        repo.upsert_tickets(&[ticket("2", BOB, 20)]).await.unwrap();
        assert_eq!(repo.tickets_by_owner(ALICE).await.unwrap().len(), 1);

        let moved = repo
            .get_ticket("0x00000000000000000000000000000000000000cc", "2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.owner, BOB);
        assert_eq!(moved.last_synced, 20);
    }
}
