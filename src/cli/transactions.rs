use std::time::Duration;

use futures::StreamExt;
use futures::future::ready;

use crate::client::{ExpenseClient, Transaction};
use crate::coalesce::{self, QueryCoalescer};
use crate::filter::{FilterCriteria, FilterEdit};
use crate::outcome::Outcome;

use super::render::render_transactions_table;
use super::{Cli, OutputFormat, TransactionsCmd, TransactionsWatchArgs, interactive, require_user};

pub(super) fn run_transactions(
    cli: &Cli,
    client: &ExpenseClient,
    cmd: TransactionsCmd,
) -> anyhow::Result<()> {
    match cmd {
        TransactionsCmd::List(args) => {
            let user = require_user(cli)?;
            let items = client.list_transactions(&user, &args.to_criteria())?;
            render_transactions(cli, &items, false)
        }
        TransactionsCmd::Watch(args) => watch(cli, client, args),
    }
}

fn render_transactions(cli: &Cli, items: &[Transaction], streaming: bool) -> anyhow::Result<()> {
    match cli.output {
        // One document per line while watching so consumers can split the output.
        OutputFormat::Json if streaming => println!("{}", serde_json::to_string(items)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Table => render_transactions_table(cli, items),
    }
    Ok(())
}

fn watch(cli: &Cli, client: &ExpenseClient, args: TransactionsWatchArgs) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    let initial = args.filters.to_criteria();
    let mut coalescer: QueryCoalescer<FilterCriteria, Vec<Transaction>> =
        QueryCoalescer::new(Duration::from_millis(args.debounce_ms));
    let mut render_error = None;

    interactive::runtime()?.block_on(async {
        let mut criteria = initial.clone();
        let edits = interactive::stdin_lines().filter_map(move |line| {
            let next = match line.parse::<FilterEdit>() {
                Ok(edit) => {
                    criteria.apply(edit);
                    Some(criteria.clone())
                }
                Err(err) => {
                    eprintln!("warning: {err}");
                    None
                }
            };
            ready(next)
        });
        let edits = futures::stream::once(ready(initial)).chain(edits);

        let fetch = |criteria: FilterCriteria| {
            let client = client.clone();
            let user = user.clone();
            async move {
                tokio::task::spawn_blocking(move || client.list_transactions(&user, &criteria))
                    .await?
            }
        };

        coalesce::drive(&mut coalescer, edits, fetch, |outcome| match outcome {
            Outcome::Ready(items) | Outcome::Flagged { data: items, .. } => {
                if let Err(err) = render_transactions(cli, items, true) {
                    render_error.get_or_insert(err);
                }
            }
            Outcome::Failed(failure) => {
                eprintln!("warning: {failure}; still showing the previous results");
            }
        })
        .await;
    });

    match render_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
