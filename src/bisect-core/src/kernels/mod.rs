pub mod search_sorted;
