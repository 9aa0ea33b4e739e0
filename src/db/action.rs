mod create_collection;
mod drop;
