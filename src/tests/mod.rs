mod test_tag_tree;
