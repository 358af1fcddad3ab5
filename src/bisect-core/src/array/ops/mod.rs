mod search_sorted;
